//! Status command implementation.

use super::check_id;
use crate::archive::{get_archive_status, print_status};
use crate::config::Settings;
use crate::error::Result;
use std::path::Path;

/// Execute the status command. Reads the archive only; no token needed.
///
/// # Errors
///
/// Returns an error if `guild` is not an id, if the archive root (or the
/// requested guild) does not exist, or if a log cannot be read.
pub fn execute(archive: Option<&Path>, guild: Option<&str>, json: bool) -> Result<()> {
    if let Some(id) = guild {
        check_id("guild", id)?;
    }
    let settings = Settings::resolve(archive, None)?;
    let status = get_archive_status(&settings.archive_dir, guild)?;

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
