//! Command implementations.

pub mod completions;
pub mod list;
pub mod pull;
pub mod status;
pub mod version;

use crate::error::{Error, Result};
use crate::pull::parse_ids;

/// Reject anything but a numeric id. Ids name archive directories, so this
/// also keeps paths inside the archive root.
fn check_id(what: &str, id: &str) -> Result<()> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{what} expects numeric ids, got '{id}'"
        )))
    }
}

/// Check every id of a comma-separated list.
fn check_id_list(what: &str, list: Option<&str>) -> Result<()> {
    for id in list.map(parse_ids).unwrap_or_default() {
        check_id(what, &id)?;
    }
    Ok(())
}
