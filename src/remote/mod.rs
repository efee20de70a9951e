//! HTTP adapters for the chat service.
//!
//! - [`HttpSource`] implements [`DataSource`](crate::pull::DataSource) over
//!   the REST API.
//! - [`HttpFetcher`] implements [`AssetFetcher`](crate::pull::AssetFetcher)
//!   by downloading CDN files under an asset root.
//!
//! Both are blocking: each owns a private tokio runtime and drives `reqwest`
//! with `block_on`. Nothing is retried.

mod cdn;
mod client;

pub use cdn::{asset_urls, local_path, HttpFetcher};
pub use client::HttpSource;

use crate::pull::{SourceError, SourceResult};

/// REST API base used when none is configured.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";

/// CDN base used when none is configured.
pub const DEFAULT_CDN_BASE: &str = "https://cdn.discordapp.com";

fn runtime() -> SourceResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SourceError::Transport(format!("Failed to create runtime: {e}")))
}

fn transport(e: &reqwest::Error) -> SourceError {
    SourceError::Transport(e.to_string())
}
