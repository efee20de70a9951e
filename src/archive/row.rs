//! Log rows.
//!
//! Every row starts with the same four-field header:
//!
//! ```text
//! timestamp  operation  entity-type  entity-id  ...content fields
//! ```
//!
//! The content fields are fixed per [`EntityKind`] (see [`crate::archive::entity`]).

use std::fmt;
use std::str::FromStr;

use chrono::Utc;

use crate::archive::codec;
use crate::archive::entity::Entity;

/// Index of the timestamp field.
pub const TIME: usize = 0;
/// Index of the operation field.
pub const OP: usize = 1;
/// Index of the entity-type field.
pub const KIND: usize = 2;
/// Index of the entity-id field.
pub const ID: usize = 3;
/// Number of header fields preceding the content fields.
pub const HEADER_LEN: usize = 4;

/// Timestamp layout: microsecond precision with an explicit offset.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Current wall-clock time in [`TIME_FORMAT`].
#[must_use]
pub fn timestamp() -> String {
    Utc::now().format(TIME_FORMAT).to_string()
}

/// Row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// The entity exists (first sighting or a changed version).
    Add,
    /// The entity no longer exists.
    Del,
}

impl Op {
    /// Token written to the log.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Del => "del",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Op {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "del" => Ok(Self::Del),
            _ => Err(format!("Unknown operation: {s}")),
        }
    }
}

/// The closed set of entity kinds that can appear in a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Message,
    Attachment,
    Reaction,
    Embed,
    Guild,
    User,
    Role,
    Channel,
    PermOverwrite,
    Emoji,
}

impl EntityKind {
    /// All kinds, in log-token order.
    pub const ALL: [Self; 10] = [
        Self::Message,
        Self::Attachment,
        Self::Reaction,
        Self::Embed,
        Self::Guild,
        Self::User,
        Self::Role,
        Self::Channel,
        Self::PermOverwrite,
        Self::Emoji,
    ];

    /// Token written to the log.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Attachment => "attachment",
            Self::Reaction => "reaction",
            Self::Embed => "embed",
            Self::Guild => "guild",
            Self::User => "user",
            Self::Role => "role",
            Self::Channel => "channel",
            Self::PermOverwrite => "permoverwrite",
            Self::Emoji => "emoji",
        }
    }

    /// Whether rows of this kind live in the guild log rather than a channel log.
    #[must_use]
    pub const fn is_guild_metadata(&self) -> bool {
        matches!(
            self,
            Self::Guild | Self::User | Self::Role | Self::Channel | Self::PermOverwrite | Self::Emoji
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown entity type: {s}"))
    }
}

/// One decoded log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub timestamp: String,
    pub op: Op,
    pub kind: EntityKind,
    pub id: String,
    /// Entity-specific fields following the header.
    pub content: Vec<String>,
}

impl Row {
    /// Build a row for an entity, stamped with the current time.
    #[must_use]
    pub fn new(op: Op, entity: &Entity) -> Self {
        Self::with_timestamp(timestamp(), op, entity)
    }

    /// Build a row for an entity with an explicit timestamp.
    #[must_use]
    pub fn with_timestamp(timestamp: String, op: Op, entity: &Entity) -> Self {
        Self {
            timestamp,
            op,
            kind: entity.kind(),
            id: entity.id(),
            content: entity.fields(),
        }
    }

    /// Parse a row from decoded fields.
    ///
    /// Returns `None` for short rows or rows whose operation or entity type
    /// is not recognised. Those are tolerated, never fatal.
    #[must_use]
    pub fn from_fields(mut fields: Vec<String>) -> Option<Self> {
        if fields.len() < HEADER_LEN {
            return None;
        }
        let op = fields[OP].parse().ok()?;
        let kind = fields[KIND].parse().ok()?;
        let content = fields.split_off(HEADER_LEN);
        let id = std::mem::take(&mut fields[ID]);
        let timestamp = std::mem::take(&mut fields[TIME]);
        Some(Self {
            timestamp,
            op,
            kind,
            id,
            content,
        })
    }

    /// Decode a log line. See [`Row::from_fields`] for when this yields `None`.
    #[must_use]
    pub fn decode(line: &str) -> Option<Self> {
        Self::from_fields(codec::decode(line))
    }

    /// All fields in log order, header included.
    #[must_use]
    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(HEADER_LEN + self.content.len());
        fields.push(self.timestamp.clone());
        fields.push(self.op.as_str().to_string());
        fields.push(self.kind.as_str().to_string());
        fields.push(self.id.clone());
        fields.extend(self.content.iter().cloned());
        fields
    }

    /// Encode as one terminated log line.
    #[must_use]
    pub fn encode(&self) -> String {
        codec::encode(&self.to_fields())
    }
}
