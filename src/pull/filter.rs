//! Guild and channel selection.

use std::collections::HashSet;

/// Split a comma-separated id list, dropping empty items.
#[must_use]
pub fn parse_ids(list: &str) -> HashSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Include/exclude lists for guilds and channels.
///
/// An empty include list admits everything not excluded.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    guilds: HashSet<String>,
    exclude_guilds: HashSet<String>,
    channels: HashSet<String>,
    exclude_channels: HashSet<String>,
}

impl Filter {
    /// Build from the comma-separated CLI lists.
    #[must_use]
    pub fn from_lists(
        guilds: Option<&str>,
        exclude_guilds: Option<&str>,
        channels: Option<&str>,
        exclude_channels: Option<&str>,
    ) -> Self {
        let ids = |list: Option<&str>| list.map(parse_ids).unwrap_or_default();
        Self {
            guilds: ids(guilds),
            exclude_guilds: ids(exclude_guilds),
            channels: ids(channels),
            exclude_channels: ids(exclude_channels),
        }
    }

    #[must_use]
    pub fn wants_guild(&self, id: &str) -> bool {
        wanted(&self.guilds, &self.exclude_guilds, id)
    }

    #[must_use]
    pub fn wants_channel(&self, id: &str) -> bool {
        wanted(&self.channels, &self.exclude_channels, id)
    }
}

fn wanted(include: &HashSet<String>, exclude: &HashSet<String>, id: &str) -> bool {
    (include.is_empty() || include.contains(id)) && !exclude.contains(id)
}
