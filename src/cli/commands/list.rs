//! List command implementation.

use super::check_id;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::pull::{list_guilds, Channel, DataSource};
use crate::remote::HttpSource;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

/// One guild and, unless summarized, its channels.
#[derive(Debug, Serialize)]
struct GuildListing {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<Vec<ChannelListing>>,
}

#[derive(Debug, Serialize)]
struct ChannelListing {
    id: String,
    name: String,
    kind: String,
    #[serde(skip)]
    text: bool,
    #[serde(skip)]
    voice: bool,
}

impl From<&Channel> for ChannelListing {
    fn from(channel: &Channel) -> Self {
        Self {
            id: channel.id.clone(),
            name: channel.display_name().to_string(),
            kind: channel.kind_name(),
            text: channel.is_text(),
            voice: channel.kind_name() == "voice",
        }
    }
}

impl ChannelListing {
    fn symbol(&self) -> &'static str {
        if self.text {
            "#"
        } else if self.voice {
            "🔊 "
        } else {
            "(?) "
        }
    }
}

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if no token is configured, the API call fails, or
/// `guild` is not one of the account's guilds.
pub fn execute(
    archive: Option<&Path>,
    token: Option<&str>,
    guild: Option<&str>,
    summary: bool,
    json: bool,
) -> Result<()> {
    if let Some(id) = guild {
        check_id("guild", id)?;
    }
    let settings = Settings::resolve(archive, token)?;
    let mut source = HttpSource::new(&settings.api_base, settings.require_token()?)?;

    let listing = collect(&mut source, guild, summary)?;

    if json {
        println!("{}", serde_json::to_string(&listing)?);
    } else {
        print_listing(&listing);
    }
    Ok(())
}

fn collect<S: DataSource>(
    source: &mut S,
    only: Option<&str>,
    summary: bool,
) -> Result<Vec<GuildListing>> {
    let guilds: Vec<_> = list_guilds(source)?
        .into_iter()
        .filter(|g| only.is_none_or(|id| g.id == id))
        .collect();

    if let Some(id) = only {
        if guilds.is_empty() {
            return Err(Error::GuildNotFound { id: id.to_string() });
        }
    }

    let mut listing = Vec::with_capacity(guilds.len());
    for guild in guilds {
        let channels = if summary {
            None
        } else {
            let mut channels = source.channels(&guild.id)?;
            channels.sort_by_key(|c| c.position);
            Some(channels.iter().map(ChannelListing::from).collect())
        };
        listing.push(GuildListing {
            id: guild.id,
            name: guild.name,
            channels,
        });
    }
    Ok(listing)
}

fn print_listing(listing: &[GuildListing]) {
    if listing.is_empty() {
        println!("{}", "No guilds visible to this account.".dimmed());
        return;
    }

    for guild in listing {
        println!("{} {}", guild.id.blue().bold(), guild.name.bold());
        for channel in guild.channels.iter().flatten() {
            println!(
                "  {}{} {}",
                channel.symbol(),
                channel.name,
                format!("({})", channel.id).dimmed()
            );
        }
    }
}
