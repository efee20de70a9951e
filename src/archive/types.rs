//! Shared archive types: errors, write statistics and status reports.

use std::collections::BTreeMap;

use serde::Serialize;

/// Archive-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// IO error while reading or appending a log.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Another process holds the exclusive lock on a log.
    #[error("Log is locked by another process: {0}")]
    Locked(String),

    /// Archive directory does not exist.
    #[error("Archive not found: {0}")]
    NotFound(String),
}

/// Result type for archive operations.
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// What happened to the rows offered to a log during one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    /// Rows appended because they were new or changed.
    pub written: usize,
    /// Rows dropped because the cached state already matched.
    pub suppressed: usize,
    /// Child rows appended unconditionally.
    pub appended: usize,
    /// Synthetic deletion rows emitted by the sweep.
    pub deleted: usize,
}

impl WriteStats {
    /// Total rows that reached the file.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.written + self.appended + self.deleted
    }

    /// Fold another session's counters into this one.
    pub fn merge(&mut self, other: &Self) {
        self.written += other.written;
        self.suppressed += other.suppressed;
        self.appended += other.appended;
        self.deleted += other.deleted;
    }
}

/// Offline view of an archive root.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveStatus {
    /// Archive root directory.
    pub root: String,
    /// One entry per archived guild, ordered by id.
    pub guilds: Vec<GuildStatus>,
}

/// State of one guild directory.
#[derive(Debug, Clone, Serialize)]
pub struct GuildStatus {
    pub guild_id: String,
    /// Name from the latest `guild` row, if any.
    pub name: Option<String>,
    /// Live entity counts per kind from the replayed guild log.
    pub entities: BTreeMap<String, usize>,
    /// Users with any row in the guild log, departed members and
    /// placeholders included.
    pub users_ever_seen: usize,
    /// Malformed rows skipped while replaying the guild log.
    pub skipped_rows: usize,
    /// SHA256 of the reconstructed guild state.
    pub fingerprint: String,
    /// Guild log followed by channel logs.
    pub logs: Vec<LogFileInfo>,
}

/// Information about one log file.
#[derive(Debug, Clone, Serialize)]
pub struct LogFileInfo {
    /// File name (e.g., "guild.tsv").
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Number of rows in the file.
    pub line_count: usize,
    /// Id of the last downloaded message (channel logs only).
    pub resume_cursor: Option<String>,
}
