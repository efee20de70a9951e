//! Append-only archive logs and the reconciliation engine.
//!
//! Every guild gets a directory under the archive root holding one log for
//! guild metadata and one log per channel:
//!
//! ```text
//! <root>/<guild-id>/guild.tsv
//! <root>/<guild-id>/<channel-id>.tsv
//! ```
//!
//! A log is a sequence of tab-separated rows. Nothing is ever rewritten:
//! edits are new `add` rows and deletions are `del` rows.
//!
//! ```text
//! 2024-05-01T10:20:30.123456+00:00	add	role	42	Admin	1	0	8	hoist
//! ```
//!
//! - **Codec**: field escaping and line encoding
//! - **Row / Entity**: the header and per-kind field schemas
//! - **Scanner**: reverse line reads and the channel resume cursor
//! - **Cache**: last-known-state replay, write/suppress decisions and the
//!   deletion sweep
//! - **Status**: offline view of an archive root
//!
//! # Example
//!
//! ```ignore
//! use pullcord::archive::{LogState, LogWriter, Reconciler, Row, Op};
//!
//! let state = LogState::load(&path)?;
//! let mut rec = Reconciler::new(LogWriter::open_locked(&path)?, state);
//! rec.record(&Row::new(Op::Add, &entity))?;
//! rec.sweep()?;
//! ```

mod cache;
mod codec;
mod entity;
mod file;
mod row;
mod scanner;
mod status;
mod types;

pub use cache::{
    fields_equal, DeletionCandidates, Decision, EverSeen, LogState, Reconciler, StateCache,
};
pub use codec::{decode, encode, escape, unescape};
pub use entity::{
    flag, AttachmentEntry, ChannelEntry, EmbedEntry, EmojiEntry, Entity, GuildEntry,
    MessageEntry, PermOverwriteEntry, ReactionEntry, RoleEntry, UserEntry,
};
pub use file::{
    channel_log_path, count_lines, file_size, guild_dir, guild_log_path, replay, replay_file,
    LogWriter, GUILD_LOG, LOG_EXTENSION,
};
pub use row::{timestamp, EntityKind, Op, Row, HEADER_LEN, TIME_FORMAT};
pub use scanner::{resume_cursor, scan_file, ReverseScanner, CHUNK_SIZE};
pub use status::{get_archive_status, print_status};
pub use types::{
    ArchiveError, ArchiveResult, ArchiveStatus, GuildStatus, LogFileInfo, WriteStats,
};
