//! Log file operations.
//!
//! Logs are only ever appended to. Each row is written with a single
//! `write_all` of its complete encoded line on a file opened in append mode,
//! so concurrent appenders cannot interleave partial rows.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::archive::codec;
use crate::archive::row::Row;
use crate::archive::types::{ArchiveError, ArchiveResult};

/// File name of a guild's metadata log.
pub const GUILD_LOG: &str = "guild.tsv";

/// Extension shared by every log file.
pub const LOG_EXTENSION: &str = "tsv";

/// Directory holding one guild's logs.
#[must_use]
pub fn guild_dir(root: &Path, guild_id: &str) -> PathBuf {
    root.join(guild_id)
}

/// `<root>/<guild>/guild.tsv`
#[must_use]
pub fn guild_log_path(root: &Path, guild_id: &str) -> PathBuf {
    guild_dir(root, guild_id).join(GUILD_LOG)
}

/// `<root>/<guild>/<channel>.tsv`
#[must_use]
pub fn channel_log_path(root: &Path, guild_id: &str, channel_id: &str) -> PathBuf {
    guild_dir(root, guild_id).join(format!("{channel_id}.{LOG_EXTENSION}"))
}

/// Append-only handle on one log.
#[derive(Debug)]
pub struct LogWriter {
    /// `None` until the first row of a deferred writer.
    file: Option<File>,
    path: PathBuf,
    locked: bool,
}

/// Open `path` for appending, creating it and its directory if needed.
fn open_append(path: &Path) -> ArchiveResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

impl LogWriter {
    /// Open a log for appending, creating it and its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn open(path: &Path) -> ArchiveResult<Self> {
        Ok(Self {
            file: Some(open_append(path)?),
            path: path.to_path_buf(),
            locked: false,
        })
    }

    /// A writer that creates the log on its first row. Nothing touches the
    /// filesystem before that.
    #[must_use]
    pub fn deferred(path: &Path) -> Self {
        Self {
            file: None,
            path: path.to_path_buf(),
            locked: false,
        }
    }

    /// Open a log and take an advisory exclusive lock on it.
    ///
    /// The lock is held until the writer is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Locked`] if another process holds the lock.
    pub fn open_locked(path: &Path) -> ArchiveResult<Self> {
        let file = open_append(path)?;
        file.try_lock_exclusive()
            .map_err(|_| ArchiveError::Locked(path.display().to_string()))?;
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            locked: true,
        })
    }

    /// Path of the underlying log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be created or the write fails.
    pub fn write_row(&mut self, row: &Row) -> ArchiveResult<()> {
        let file = match self.file.take() {
            Some(file) => file,
            None => open_append(&self.path)?,
        };
        self.file.insert(file).write_all(row.encode().as_bytes())?;
        Ok(())
    }

    /// Flush appended rows to disk. A deferred writer with no rows has
    /// nothing to flush.
    ///
    /// # Errors
    ///
    /// Returns an error if `fsync` fails.
    pub fn sync(&mut self) -> ArchiveResult<()> {
        if let Some(file) = &self.file {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if let (true, Some(file)) = (self.locked, &self.file) {
            let _ = FileExt::unlock(file);
        }
    }
}

/// Replay a log forward, calling `f` for every decodable row.
///
/// Lines are split on `\n` only. Rows that are short or carry unknown
/// tokens are skipped; the number skipped is returned.
///
/// # Errors
///
/// Returns an error if reading fails.
pub fn replay<R: BufRead, F: FnMut(Row)>(reader: R, mut f: F) -> ArchiveResult<usize> {
    let mut skipped = 0;

    for (line_num, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        match Row::from_fields(codec::decode(&line)) {
            Some(row) => f(row),
            None => {
                tracing::debug!(line = line_num + 1, "skipping malformed row");
                skipped += 1;
            }
        }
    }

    Ok(skipped)
}

/// Replay a log file. A missing file replays as empty.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn replay_file<F: FnMut(Row)>(path: &Path, f: F) -> ArchiveResult<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let file = File::open(path)?;
    replay(BufReader::new(file), f)
}

/// Count the rows (lines) in a log. Returns 0 if it doesn't exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn count_lines(path: &Path) -> ArchiveResult<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let count = reader.split(b'\n').filter(Result::is_ok).count();
    Ok(count)
}

/// Get the size of a file in bytes.
///
/// Returns 0 if the file doesn't exist.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
