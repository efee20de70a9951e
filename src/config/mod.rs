//! Configuration management.
//!
//! Settings come from `~/.pullcord/config.json`:
//!
//! ```json
//! {
//!   "token": "Bot ...",
//!   "archive_dir": "/srv/chat/channels",
//!   "asset_dir": "/srv/chat",
//!   "api_base": "https://discord.com/api/v9",
//!   "cdn_base": "https://cdn.discordapp.com"
//! }
//! ```
//!
//! Every key is optional. Each value resolves as CLI flag, then environment
//! variable, then config file, then default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::{DEFAULT_API_BASE, DEFAULT_CDN_BASE};

/// Archive root used when none is configured, relative to the working directory.
pub const DEFAULT_ARCHIVE_DIR: &str = "channels";

/// Asset root used when none is configured.
pub const DEFAULT_ASSET_DIR: &str = ".";

pub const TOKEN_ENV: &str = "PULLCORD_TOKEN";
pub const ARCHIVE_ENV: &str = "PULLCORD_ARCHIVE";
pub const ASSETS_ENV: &str = "PULLCORD_ASSETS";
pub const API_ENV: &str = "PULLCORD_API";
pub const CDN_ENV: &str = "PULLCORD_CDN";

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullcordConfig {
    pub token: Option<String>,
    pub archive_dir: Option<PathBuf>,
    pub asset_dir: Option<PathBuf>,
    pub api_base: Option<String>,
    pub cdn_base: Option<String>,
}

/// Get the global pullcord directory, `~/.pullcord/`.
#[must_use]
pub fn global_pullcord_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".pullcord"))
}

/// Get the config file path.
fn config_path() -> Result<PathBuf> {
    global_pullcord_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or(Error::Config("Could not determine home directory".into()))
}

/// Load the configuration from `~/.pullcord/config.json`.
///
/// A missing file yields the default configuration.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<PullcordConfig> {
    load_config_from(&config_path()?)
}

/// Load the configuration from an explicit path.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<PullcordConfig> {
    if !path.exists() {
        return Ok(PullcordConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Non-empty value of an environment variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub token: Option<String>,
    pub archive_dir: PathBuf,
    pub asset_dir: PathBuf,
    pub api_base: String,
    pub cdn_base: String,
}

impl Settings {
    /// Resolve settings from CLI flags, the environment and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn resolve(archive_flag: Option<&Path>, token_flag: Option<&str>) -> Result<Self> {
        let config = load_config()?;
        Ok(Self::from_sources(archive_flag, token_flag, &config, env_value))
    }

    /// Resolve against an explicit config and environment lookup.
    pub fn from_sources(
        archive_flag: Option<&Path>,
        token_flag: Option<&str>,
        config: &PullcordConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let token = token_flag
            .map(str::to_string)
            .or_else(|| env(TOKEN_ENV))
            .or_else(|| config.token.clone());

        let archive_dir = archive_flag
            .map(Path::to_path_buf)
            .or_else(|| env(ARCHIVE_ENV).map(PathBuf::from))
            .or_else(|| config.archive_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_DIR));

        let asset_dir = env(ASSETS_ENV)
            .map(PathBuf::from)
            .or_else(|| config.asset_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_DIR));

        let api_base = env(API_ENV)
            .or_else(|| config.api_base.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let cdn_base = env(CDN_ENV)
            .or_else(|| config.cdn_base.clone())
            .unwrap_or_else(|| DEFAULT_CDN_BASE.to_string());

        Self {
            token,
            archive_dir,
            asset_dir,
            api_base,
            cdn_base,
        }
    }

    /// The API token, for commands that talk to the service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingToken`] if no source provided one.
    pub fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(Error::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_sources(None, None, &PullcordConfig::default(), no_env);
        assert_eq!(settings.token, None);
        assert_eq!(settings.archive_dir, PathBuf::from("channels"));
        assert_eq!(settings.asset_dir, PathBuf::from("."));
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.cdn_base, DEFAULT_CDN_BASE);
        assert!(matches!(settings.require_token(), Err(Error::MissingToken)));
    }

    #[test]
    fn test_priority_flag_env_config() {
        let config = PullcordConfig {
            token: Some("from-config".into()),
            archive_dir: Some("/config/archive".into()),
            asset_dir: Some("/config/assets".into()),
            api_base: Some("https://config.example/api".into()),
            cdn_base: None,
        };
        let env: HashMap<&str, &str> = [(TOKEN_ENV, "from-env"), (ARCHIVE_ENV, "/env/archive")]
            .into_iter()
            .collect();
        let lookup = |name: &str| env.get(name).map(|v| (*v).to_string());

        let settings = Settings::from_sources(None, None, &config, lookup);
        assert_eq!(settings.require_token().unwrap(), "from-env");
        assert_eq!(settings.archive_dir, PathBuf::from("/env/archive"));
        assert_eq!(settings.asset_dir, PathBuf::from("/config/assets"));
        assert_eq!(settings.api_base, "https://config.example/api");
        assert_eq!(settings.cdn_base, DEFAULT_CDN_BASE);

        let settings =
            Settings::from_sources(Some(Path::new("/flag")), Some("from-flag"), &config, lookup);
        assert_eq!(settings.require_token().unwrap(), "from-flag");
        assert_eq!(settings.archive_dir, PathBuf::from("/flag"));
    }

    #[test]
    fn test_load_missing_config_is_default() {
        let temp = TempDir::new().unwrap();
        let config = load_config_from(&temp.path().join("config.json")).unwrap();
        assert_eq!(config, PullcordConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"token": "Bot abc", "archive_dir": "/srv/channels"}"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.token.as_deref(), Some("Bot abc"));
        assert_eq!(config.archive_dir, Some(PathBuf::from("/srv/channels")));
        assert_eq!(config.cdn_base, None);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.exit_code(), 7);
    }
}
