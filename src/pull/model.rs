//! Wire models for the chat service's REST API.
//!
//! Only the fields that end up in a log row (or drive the sync) are
//! modelled. Unknown fields are ignored, and missing optional ones default,
//! so older and newer API versions both decode.

use serde::Deserialize;
use serde_json::Value;

use crate::archive::{
    AttachmentEntry, ChannelEntry, EmbedEntry, EmojiEntry, GuildEntry, MessageEntry,
    PermOverwriteEntry, RoleEntry, UserEntry,
};

/// Channel type of a guild text channel.
pub const CHANNEL_TYPE_TEXT: u8 = 0;
/// Channel type of a guild voice channel.
pub const CHANNEL_TYPE_VOICE: u8 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    /// Row for a user who is referenced but not a member.
    #[must_use]
    pub fn placeholder_entry(&self) -> UserEntry {
        UserEntry {
            id: self.id.clone(),
            username: self.username.clone(),
            nick: String::new(),
            discriminator: self.discriminator.clone(),
            avatar: self.avatar.clone().unwrap_or_default(),
            roles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Member {
    #[must_use]
    pub fn entry(&self) -> UserEntry {
        UserEntry {
            nick: self.nick.clone().unwrap_or_default(),
            roles: self.roles.clone(),
            ..self.user.placeholder_entry()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Role {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub hoist: bool,
}

impl Role {
    #[must_use]
    pub fn entry(&self) -> RoleEntry {
        RoleEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color,
            position: self.position,
            permissions: self.permissions.clone(),
            hoist: self.hoist,
        }
    }
}

/// A guild emoji, or the emoji of a reaction (unicode emoji have no id).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Emoji {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub require_colons: bool,
    #[serde(default)]
    pub animated: bool,
}

fn default_true() -> bool {
    true
}

impl Emoji {
    /// The form used in reaction endpoints and rows: `name:id` for custom
    /// emoji, the bare name otherwise.
    #[must_use]
    pub fn api_name(&self) -> String {
        let name = self.name.as_deref().unwrap_or_default();
        match &self.id {
            Some(id) => format!("{name}:{id}"),
            None => name.to_string(),
        }
    }

    #[must_use]
    pub fn entry(&self) -> EmojiEntry {
        EmojiEntry {
            id: self.id.clone().unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
            require_colons: self.require_colons,
            animated: self.animated,
        }
    }
}

/// Entry in the current user's guild list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartialGuild {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Guild {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub splash: Option<String>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub afk_channel_id: Option<String>,
    #[serde(default)]
    pub afk_timeout: u64,
    #[serde(default, alias = "widget_enabled")]
    pub embed_enabled: bool,
    #[serde(default, alias = "widget_channel_id")]
    pub embed_channel_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
}

impl Guild {
    #[must_use]
    pub fn entry(&self) -> GuildEntry {
        GuildEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            icon: self.icon.clone().unwrap_or_default(),
            splash: self.splash.clone().unwrap_or_default(),
            owner_id: self.owner_id.clone(),
            afk_channel_id: self.afk_channel_id.clone().unwrap_or_default(),
            afk_timeout: self.afk_timeout,
            embeddable: self.embed_enabled,
            embed_channel_id: self.embed_channel_id.clone().unwrap_or_default(),
        }
    }
}

/// Overwrite target type: numeric in current API versions, a name in old ones.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OverwriteType {
    Numeric(u8),
    Named(String),
}

impl OverwriteType {
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Numeric(0) => "role".to_string(),
            Self::Numeric(1) => "member".to_string(),
            Self::Numeric(n) => n.to_string(),
            Self::Named(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PermissionOverwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OverwriteType,
    #[serde(default)]
    pub allow: String,
    #[serde(default)]
    pub deny: String,
}

impl PermissionOverwrite {
    #[must_use]
    pub fn entry(&self, channel_id: &str) -> PermOverwriteEntry {
        PermOverwriteEntry {
            channel_id: channel_id.to_string(),
            id: self.id.clone(),
            kind: self.kind.name(),
            allow: self.allow.clone(),
            deny: self.deny.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

impl Channel {
    /// Only text channels have message history to pull.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.kind == CHANNEL_TYPE_TEXT
    }

    /// Type as written to the log.
    #[must_use]
    pub fn kind_name(&self) -> String {
        match self.kind {
            CHANNEL_TYPE_TEXT => "text".to_string(),
            CHANNEL_TYPE_VOICE => "voice".to_string(),
            4 => "category".to_string(),
            5 => "news".to_string(),
            n => n.to_string(),
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn entry(&self) -> ChannelEntry {
        ChannelEntry {
            id: self.id.clone(),
            kind: self.kind_name(),
            position: self.position,
            name: self.display_name().to_string(),
            topic: self.topic.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

impl Attachment {
    #[must_use]
    pub fn entry(&self, message_id: &str) -> AttachmentEntry {
        AttachmentEntry {
            id: self.id.clone(),
            message_id: message_id.to_string(),
            filename: self.filename.clone(),
            size: self.size,
            url: self.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reaction {
    #[serde(default)]
    pub count: u64,
    pub emoji: Emoji,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub edited_timestamp: Option<String>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mentions: Vec<User>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Kept verbatim; re-serialized into the embed row.
    #[serde(default)]
    pub embeds: Vec<Value>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    #[must_use]
    pub fn entry(&self) -> MessageEntry {
        MessageEntry {
            id: self.id.clone(),
            author_id: self.author.id.clone(),
            edited_timestamp: self.edited_timestamp.clone(),
            tts: self.tts,
            content: self.content.clone(),
        }
    }
}

/// Embed row for one of a message's embeds.
#[must_use]
pub fn embed_entry(message_id: &str, embed: &Value) -> EmbedEntry {
    EmbedEntry {
        message_id: message_id.to_string(),
        json: embed.to_string(),
    }
}
