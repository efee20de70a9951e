//! Reverse line scanner.
//!
//! Reads a seekable source backwards in fixed-size chunks, yielding lines
//! last-first without loading the whole file. Used to find the resume
//! cursor of a channel log in time proportional to the tail, not the log.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::archive::row::{EntityKind, Op, Row};
use crate::archive::types::ArchiveResult;

/// Bytes read per step from the tail.
pub const CHUNK_SIZE: usize = 1024;

/// Yields the lines of a source in reverse order.
///
/// A source that ends with `\n` does not produce an empty final line, and a
/// trailing `\r` is dropped from every line. Once the start of the source is
/// reached the remaining bytes, if any, are yielded as the first line of the
/// file and every later call returns `None`.
pub struct ReverseScanner<R> {
    source: R,
    /// Offset of the first byte held in `buf`.
    pos: u64,
    buf: Vec<u8>,
    at_tail: bool,
    done: bool,
}

impl<R: Read + Seek> ReverseScanner<R> {
    /// Scan `source`, whose readable length is `len` bytes.
    pub fn new(source: R, len: u64) -> Self {
        Self {
            source,
            pos: len,
            buf: Vec::new(),
            at_tail: true,
            done: false,
        }
    }

    /// Next line (towards the start) and the byte offset where it begins.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking or reading the source fails.
    pub fn next_line(&mut self) -> io::Result<Option<(String, u64)>> {
        if self.done {
            return Ok(None);
        }

        loop {
            if let Some(idx) = self.buf.iter().rposition(|&b| b == b'\n') {
                let line = String::from_utf8_lossy(drop_cr(&self.buf[idx + 1..])).into_owned();
                let start = self.pos + idx as u64 + 1;
                self.buf.truncate(idx);
                return Ok(Some((line, start)));
            }

            if !self.read_more()? {
                self.done = true;
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = String::from_utf8_lossy(drop_cr(&self.buf)).into_owned();
                self.buf.clear();
                return Ok(Some((line, 0)));
            }
        }
    }

    /// Prepend the previous chunk to the buffer. Returns `false` at the start.
    fn read_more(&mut self) -> io::Result<bool> {
        if self.pos == 0 {
            return Ok(false);
        }

        let size = usize::try_from(self.pos).map_or(CHUNK_SIZE, |p| p.min(CHUNK_SIZE));
        self.pos -= size as u64;

        let mut chunk = vec![0; size];
        self.source.seek(SeekFrom::Start(self.pos))?;
        self.source.read_exact(&mut chunk)?;

        if self.at_tail {
            self.at_tail = false;
            if chunk.last() == Some(&b'\n') {
                chunk.pop();
            }
        }

        chunk.extend_from_slice(&self.buf);
        self.buf = chunk;
        Ok(true)
    }
}

impl<R: Read + Seek> Iterator for ReverseScanner<R> {
    type Item = io::Result<(String, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

fn drop_cr(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r").unwrap_or(data)
}

/// Open a file for reverse scanning.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its size read.
pub fn scan_file(path: &Path) -> ArchiveResult<ReverseScanner<File>> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    Ok(ReverseScanner::new(file, len))
}

/// Find the id of the most recent `add message` row of a channel log.
///
/// Returns `None` when the log does not exist or holds no message rows.
/// Undecodable lines are skipped.
///
/// # Errors
///
/// Returns an error if the log cannot be read.
pub fn resume_cursor(path: &Path) -> ArchiveResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    for line in scan_file(path)? {
        let (line, _) = line?;
        if let Some(row) = Row::decode(&line) {
            if row.op == Op::Add && row.kind == EntityKind::Message {
                return Ok(Some(row.id));
            }
        }
    }

    Ok(None)
}
