//! Error types for the pullcord CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (3=not_found, 4=validation, 5=upstream, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::pull::{PullError, SourceError};

/// Result type alias for pullcord operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts can match on either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Not Found (exit 3)
    ArchiveNotFound,
    GuildNotFound,

    // Validation (exit 4)
    InvalidArgument,
    MissingToken,

    // Upstream (exit 5)
    UpstreamError,
    AccessDenied,

    // Archive (exit 6)
    ArchiveError,
    LogLocked,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::ArchiveNotFound => "ARCHIVE_NOT_FOUND",
            Self::GuildNotFound => "GUILD_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::MissingToken => "MISSING_TOKEN",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::ArchiveError => "ARCHIVE_ERROR",
            Self::LogLocked => "LOG_LOCKED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code (3-8). Exit code 2 is left to clap's usage errors.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ArchiveNotFound | Self::GuildNotFound => 3,
            Self::InvalidArgument | Self::MissingToken => 4,
            Self::UpstreamError | Self::AccessDenied => 5,
            Self::ArchiveError | Self::LogLocked => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether running the same command again may succeed.
    ///
    /// True for transient upstream failures and a log held by another
    /// pull. False for bad input or missing data.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamError | Self::LogLocked)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in pullcord CLI operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No API token configured")]
    MissingToken,

    #[error("Guild not found: {id}")]
    GuildNotFound { id: String },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Upstream(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<PullError> for Error {
    fn from(e: PullError) -> Self {
        match e {
            PullError::Archive(e) => Self::Archive(e),
            PullError::Source(e) => Self::Upstream(e),
        }
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingToken => ErrorCode::MissingToken,
            Self::GuildNotFound { .. } => ErrorCode::GuildNotFound,
            Self::Archive(ArchiveError::NotFound(_)) => ErrorCode::ArchiveNotFound,
            Self::Archive(ArchiveError::Locked(_)) => ErrorCode::LogLocked,
            Self::Archive(ArchiveError::Io(_)) => ErrorCode::ArchiveError,
            Self::Upstream(e) if e.is_skippable() => ErrorCode::AccessDenied,
            Self::Upstream(_) => ErrorCode::UpstreamError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::MissingToken => Some(
                "Pass --token, set PULLCORD_TOKEN, or add \"token\" to ~/.pullcord/config.json.\n  \
                 Bot tokens need the \"Bot \" prefix."
                    .to_string(),
            ),

            Self::GuildNotFound { id } => Some(format!(
                "No guild with ID '{id}' is visible to this account. Use `pullcord list` to see them."
            )),

            Self::Archive(ArchiveError::NotFound(_)) => Some(
                "Nothing has been pulled yet. Run `pullcord pull` first, or point --archive at an existing archive."
                    .to_string(),
            ),

            Self::Archive(ArchiveError::Locked(_)) => Some(
                "Another pull is writing this guild. Wait for it to finish and run again.".to_string(),
            ),

            Self::Upstream(SourceError::Api { status: 401, .. }) => {
                Some("The token was rejected. Check it and its \"Bot \" prefix.".to_string())
            }

            Self::Upstream(e) if e.is_skippable() => Some(
                "The account cannot read this resource. Use `pullcord list` to see what is visible."
                    .to_string(),
            ),

            Self::InvalidArgument(msg) if msg.contains("ids") => Some(
                "Guild and channel ids are numbers. Use `pullcord list` to look them up.".to_string(),
            ),

            Self::Archive(ArchiveError::Io(_))
            | Self::Upstream(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
