//! Upstream seams: where entities and asset files come from.

use std::fmt;

use crate::pull::model::{Channel, Guild, Member, Message, PartialGuild, User};

/// Largest page the guild list endpoint returns.
pub const GUILD_PAGE_LIMIT: u32 = 100;
/// Largest page the member list endpoint returns.
pub const MEMBER_PAGE_LIMIT: u32 = 1000;
/// Largest page the message history endpoint returns.
pub const MESSAGE_PAGE_LIMIT: u32 = 100;
/// Largest page the reaction user endpoint returns.
pub const REACTION_PAGE_LIMIT: u32 = 100;

/// API error code for an emoji that no longer exists.
pub const UNKNOWN_EMOJI: u64 = 10014;
/// API error code for a resource the account cannot read.
pub const MISSING_ACCESS: u64 = 50001;

/// Upstream failures.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The service answered with an error status.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        /// Service-specific error code, when the body carried one.
        code: Option<u64>,
        message: String,
    },

    /// The request never got an answer.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The answer could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A fetched file could not be stored.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the failure only means "this entity is gone or hidden" and
    /// the caller should move on.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => {
                matches!(code, Some(UNKNOWN_EMOJI | MISSING_ACCESS)) || matches!(status, 403 | 404)
            }
            Self::Transport(_) | Self::Decode(_) | Self::Io(_) => false,
        }
    }
}

/// Result type for upstream operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Paged access to the chat service.
///
/// Cursors are entity ids; `"0"` starts from the beginning.
pub trait DataSource {
    /// Guilds of the current account with ids greater than `after`.
    fn guilds(&mut self, after: &str, limit: u32) -> SourceResult<Vec<PartialGuild>>;

    /// Full guild object, roles and emoji included.
    fn guild(&mut self, guild_id: &str) -> SourceResult<Guild>;

    /// All channels of a guild.
    fn channels(&mut self, guild_id: &str) -> SourceResult<Vec<Channel>>;

    /// Members with user ids greater than `after`, in id order.
    fn members(&mut self, guild_id: &str, after: &str, limit: u32) -> SourceResult<Vec<Member>>;

    /// Messages with ids greater than `after`, newest first.
    fn messages(&mut self, channel_id: &str, after: &str, limit: u32)
    -> SourceResult<Vec<Message>>;

    /// Users who reacted to a message with `emoji` (in API name form).
    fn reaction_users(
        &mut self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
        limit: u32,
    ) -> SourceResult<Vec<User>>;
}

/// A file referenced by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Asset {
    Icon { guild_id: String, hash: String },
    Splash { guild_id: String, hash: String },
    Avatar { user_id: String, hash: String },
    Emoji { id: String, animated: bool },
    Attachment { url: String },
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icon { guild_id, hash } => write!(f, "icon {guild_id}/{hash}"),
            Self::Splash { guild_id, hash } => write!(f, "splash {guild_id}/{hash}"),
            Self::Avatar { user_id, hash } => write!(f, "avatar {user_id}/{hash}"),
            Self::Emoji { id, .. } => write!(f, "emoji {id}"),
            Self::Attachment { url } => write!(f, "attachment {url}"),
        }
    }
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    AlreadyPresent,
    Downloaded,
}

/// Stores asset files.
pub trait AssetFetcher {
    fn fetch(&mut self, asset: &Asset) -> SourceResult<Fetched>;
}
