//! Entity serializer.
//!
//! [`Entity`] is the closed set of things that can be logged. Each variant
//! carries exactly the fields its row schema needs, and [`Entity::fields`]
//! lays them out in the fixed order below (after the row header):
//!
//! | kind            | id                            | content fields |
//! |-----------------|-------------------------------|----------------|
//! | `message`       | message id                    | author id, edited timestamp, `tts`, content |
//! | `attachment`    | attachment id                 | message id, filename, size, url |
//! | `embed`         | message id                    | embed JSON |
//! | `reaction`      | user id (empty for overflow)  | message id, emoji, count |
//! | `guild`         | guild id                      | name, icon, splash, owner id, afk channel id, afk timeout, `embeddable`, embed channel id |
//! | `user`          | user id                       | username, nick, discriminator, avatar, role ids |
//! | `role`          | role id                       | name, color, position, permissions, `hoist` |
//! | `channel`       | channel id                    | type, position, name, topic |
//! | `permoverwrite` | `<channel id>:<overwrite id>` | channel id, overwrite id, type, allow, deny |
//! | `emoji`         | emoji id                      | name, `nocolons`, `animated` |
//!
//! Boolean fields hold the flag name when set and are empty otherwise.

use crate::archive::row::EntityKind;

/// Encode a boolean as its flag name or the empty string.
#[must_use]
pub fn flag(name: &str, set: bool) -> String {
    if set { name.to_string() } else { String::new() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub id: String,
    pub author_id: String,
    pub edited_timestamp: Option<String>,
    pub tts: bool,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentEntry {
    pub id: String,
    pub message_id: String,
    pub filename: String,
    pub size: u64,
    pub url: String,
}

/// An embed has no identity of its own; it is keyed by its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedEntry {
    pub message_id: String,
    pub json: String,
}

/// One reacting user, or the uncounted remainder when `user_id` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEntry {
    pub user_id: String,
    pub message_id: String,
    pub emoji: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildEntry {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub splash: String,
    pub owner_id: String,
    pub afk_channel_id: String,
    pub afk_timeout: u64,
    pub embeddable: bool,
    pub embed_channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub id: String,
    pub username: String,
    pub nick: String,
    pub discriminator: String,
    pub avatar: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleEntry {
    pub id: String,
    pub name: String,
    pub color: u32,
    pub position: i64,
    pub permissions: String,
    pub hoist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    pub id: String,
    pub kind: String,
    pub position: i64,
    pub name: String,
    pub topic: String,
}

/// Overwrite ids are only unique within a channel, so the row id is the
/// `(channel id, overwrite id)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermOverwriteEntry {
    pub channel_id: String,
    pub id: String,
    pub kind: String,
    pub allow: String,
    pub deny: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiEntry {
    pub id: String,
    pub name: String,
    pub require_colons: bool,
    pub animated: bool,
}

/// Anything that can be written to a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Message(MessageEntry),
    Attachment(AttachmentEntry),
    Embed(EmbedEntry),
    Reaction(ReactionEntry),
    Guild(GuildEntry),
    User(UserEntry),
    Role(RoleEntry),
    Channel(ChannelEntry),
    PermOverwrite(PermOverwriteEntry),
    Emoji(EmojiEntry),
}

impl Entity {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Message(_) => EntityKind::Message,
            Self::Attachment(_) => EntityKind::Attachment,
            Self::Embed(_) => EntityKind::Embed,
            Self::Reaction(_) => EntityKind::Reaction,
            Self::Guild(_) => EntityKind::Guild,
            Self::User(_) => EntityKind::User,
            Self::Role(_) => EntityKind::Role,
            Self::Channel(_) => EntityKind::Channel,
            Self::PermOverwrite(_) => EntityKind::PermOverwrite,
            Self::Emoji(_) => EntityKind::Emoji,
        }
    }

    /// The row id for this entity.
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            Self::Message(m) => m.id.clone(),
            Self::Attachment(a) => a.id.clone(),
            Self::Embed(e) => e.message_id.clone(),
            Self::Reaction(r) => r.user_id.clone(),
            Self::Guild(g) => g.id.clone(),
            Self::User(u) => u.id.clone(),
            Self::Role(r) => r.id.clone(),
            Self::Channel(c) => c.id.clone(),
            Self::PermOverwrite(o) => format!("{}:{}", o.channel_id, o.id),
            Self::Emoji(e) => e.id.clone(),
        }
    }

    /// Content fields in schema order.
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        match self {
            Self::Message(m) => vec![
                m.author_id.clone(),
                m.edited_timestamp.clone().unwrap_or_default(),
                flag("tts", m.tts),
                m.content.clone(),
            ],
            Self::Attachment(a) => vec![
                a.message_id.clone(),
                a.filename.clone(),
                a.size.to_string(),
                a.url.clone(),
            ],
            Self::Embed(e) => vec![e.json.clone()],
            Self::Reaction(r) => vec![r.message_id.clone(), r.emoji.clone(), r.count.to_string()],
            Self::Guild(g) => vec![
                g.name.clone(),
                g.icon.clone(),
                g.splash.clone(),
                g.owner_id.clone(),
                g.afk_channel_id.clone(),
                g.afk_timeout.to_string(),
                flag("embeddable", g.embeddable),
                g.embed_channel_id.clone(),
            ],
            Self::User(u) => vec![
                u.username.clone(),
                u.nick.clone(),
                u.discriminator.clone(),
                u.avatar.clone(),
                u.roles.join(","),
            ],
            Self::Role(r) => vec![
                r.name.clone(),
                r.color.to_string(),
                r.position.to_string(),
                r.permissions.clone(),
                flag("hoist", r.hoist),
            ],
            Self::Channel(c) => vec![
                c.kind.clone(),
                c.position.to_string(),
                c.name.clone(),
                c.topic.clone(),
            ],
            Self::PermOverwrite(o) => vec![
                o.channel_id.clone(),
                o.id.clone(),
                o.kind.clone(),
                o.allow.clone(),
                o.deny.clone(),
            ],
            Self::Emoji(e) => vec![
                e.name.clone(),
                flag("nocolons", !e.require_colons),
                flag("animated", e.animated),
            ],
        }
    }
}
