//! Pull command implementation.

use super::check_id_list;
use crate::cli::PullArgs;
use crate::config::Settings;
use crate::error::Result;
use crate::pull::{self, Filter, PullOptions, PullStats};
use crate::remote::{HttpFetcher, HttpSource};
use colored::Colorize;
use std::path::Path;

/// Execute the pull command.
///
/// Individual channel failures are reported in the counters, not as an
/// error.
///
/// # Errors
///
/// Returns an error if a filter holds a non-numeric id, no token is
/// configured, or the guild list cannot be fetched.
pub fn execute(
    args: &PullArgs,
    archive: Option<&Path>,
    token: Option<&str>,
    json: bool,
) -> Result<()> {
    check_id_list("--guild", args.guilds.as_deref())?;
    check_id_list("--exclude-guild", args.exclude_guilds.as_deref())?;
    check_id_list("--channel", args.channels.as_deref())?;
    check_id_list("--exclude-channel", args.exclude_channels.as_deref())?;

    let settings = Settings::resolve(archive, token)?;
    let mut source = HttpSource::new(&settings.api_base, settings.require_token()?)?;
    let mut fetcher = HttpFetcher::new(&settings.cdn_base, &settings.asset_dir)?;

    let filter = Filter::from_lists(
        args.guilds.as_deref(),
        args.exclude_guilds.as_deref(),
        args.channels.as_deref(),
        args.exclude_channels.as_deref(),
    );
    let mut options = PullOptions::new(&settings.archive_dir);
    options.assets = !args.no_assets;
    options.rescan = args.rescan;

    tracing::info!(
        archive = %settings.archive_dir.display(),
        assets = %settings.asset_dir.display(),
        rescan = options.rescan,
        "pulling"
    );
    let stats = pull::run(&mut source, &mut fetcher, options, &filter)?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &PullStats) {
    println!("{}", "Pull Complete".green().bold());
    println!("  Guilds:   {}", stats.guilds);
    println!("  Channels: {}", stats.channels);
    if stats.channels_skipped > 0 {
        println!(
            "  {}",
            format!("{} channels not readable", stats.channels_skipped).yellow()
        );
    }
    if stats.channels_failed > 0 {
        println!(
            "  {}",
            format!("{} channels failed (see log)", stats.channels_failed).red()
        );
    }
    println!("  Messages: {}", stats.messages);
    println!();

    println!("{}", "Rows".cyan().bold());
    for (name, rows) in [("guild", &stats.guild_rows), ("channel", &stats.channel_rows)] {
        println!(
            "  {:<8} {} written ({} deletions), {} unchanged",
            format!("{name}:"),
            rows.total_rows(),
            rows.deleted,
            rows.suppressed
        );
    }

    if stats.assets_downloaded + stats.assets_present + stats.assets_skipped > 0 {
        println!();
        println!("{}", "Assets".cyan().bold());
        println!(
            "  {} downloaded, {} already present, {} unavailable",
            stats.assets_downloaded, stats.assets_present, stats.assets_skipped
        );
    }
}
