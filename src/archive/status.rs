//! Archive status display.
//!
//! Everything here works offline: guild state comes from replaying
//! `guild.tsv`, resume cursors from reverse-scanning each channel log.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use colored::Colorize;

use crate::archive::cache::LogState;
use crate::archive::file::{GUILD_LOG, LOG_EXTENSION, count_lines, file_size};
use crate::archive::row::EntityKind;
use crate::archive::scanner::resume_cursor;
use crate::archive::types::{
    ArchiveError, ArchiveResult, ArchiveStatus, GuildStatus, LogFileInfo,
};

/// Collect the status of every guild under `root`, or of one guild.
///
/// # Errors
///
/// Returns [`ArchiveError::NotFound`] if the root (or the requested guild)
/// does not exist, or an IO error if a log cannot be read.
pub fn get_archive_status(root: &Path, guild: Option<&str>) -> ArchiveResult<ArchiveStatus> {
    if !root.is_dir() {
        return Err(ArchiveError::NotFound(root.display().to_string()));
    }

    let mut guild_ids = Vec::new();
    match guild {
        Some(id) => {
            if !root.join(id).is_dir() {
                return Err(ArchiveError::NotFound(root.join(id).display().to_string()));
            }
            guild_ids.push(id.to_string());
        }
        None => {
            for entry in fs::read_dir(root)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    guild_ids.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            guild_ids.sort();
        }
    }

    let guilds = guild_ids
        .into_iter()
        .map(|id| guild_status(root, id))
        .collect::<ArchiveResult<Vec<_>>>()?;

    Ok(ArchiveStatus {
        root: root.display().to_string(),
        guilds,
    })
}

fn guild_status(root: &Path, guild_id: String) -> ArchiveResult<GuildStatus> {
    let dir = root.join(&guild_id);
    let guild_log = dir.join(GUILD_LOG);
    let state = LogState::load(&guild_log)?;

    let name = state
        .cache
        .get(EntityKind::Guild, &guild_id)
        .and_then(|content| content.first())
        .cloned();

    let entities: BTreeMap<String, usize> = EntityKind::ALL
        .into_iter()
        .filter(EntityKind::is_guild_metadata)
        .map(|kind| (kind.as_str().to_string(), state.cache.count(kind)))
        .filter(|(_, count)| *count > 0)
        .collect();

    let mut logs = Vec::new();
    if guild_log.exists() {
        logs.push(LogFileInfo {
            name: GUILD_LOG.to_string(),
            size: file_size(&guild_log),
            line_count: count_lines(&guild_log)?,
            resume_cursor: None,
        });
    }

    let mut channel_logs: Vec<_> = fs::read_dir(&dir)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == LOG_EXTENSION)
                && p.file_name().is_some_and(|n| n != GUILD_LOG)
        })
        .collect();
    channel_logs.sort();

    for path in channel_logs {
        logs.push(LogFileInfo {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: file_size(&path),
            line_count: count_lines(&path)?,
            resume_cursor: resume_cursor(&path)?,
        });
    }

    Ok(GuildStatus {
        guild_id,
        name,
        entities,
        users_ever_seen: state.ever_seen.count(EntityKind::User),
        skipped_rows: state.skipped,
        fingerprint: state.cache.fingerprint(),
        logs,
    })
}

/// Print archive status to stdout in a human-readable format.
pub fn print_status(status: &ArchiveStatus) {
    println!("{}", "Archive Status".bold().underline());
    println!("  Root: {}", status.root);
    println!();

    if status.guilds.is_empty() {
        println!("{}", "No guilds archived yet.".dimmed());
        println!("{}", "Run 'pullcord pull' to start an archive.".dimmed());
        return;
    }

    for guild in &status.guilds {
        match &guild.name {
            Some(name) => println!("{} {}", guild.guild_id.blue().bold(), name.bold()),
            None => println!("{}", guild.guild_id.blue().bold()),
        }

        if !guild.entities.is_empty() {
            let counts: Vec<String> = guild
                .entities
                .iter()
                .map(|(kind, count)| format!("{kind}: {count}"))
                .collect();
            println!("  {}", counts.join(", "));
        }
        if guild.users_ever_seen > 0 {
            println!("  Users ever seen: {}", guild.users_ever_seen);
        }
        println!("  Fingerprint: {}", guild.fingerprint.dimmed());
        if guild.skipped_rows > 0 {
            println!(
                "  {}",
                format!("{} malformed rows skipped", guild.skipped_rows).yellow()
            );
        }

        for log in &guild.logs {
            let cursor = log
                .resume_cursor
                .as_deref()
                .map(|id| format!(", last message {id}"))
                .unwrap_or_default();
            println!(
                "    {} ({}, {} rows{cursor})",
                log.name,
                format_size(log.size),
                log.line_count
            );
        }
        println!();
    }
}

/// Format a byte size as a human-readable string.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
