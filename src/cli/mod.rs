//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// pullcord - incremental, append-only archiver for chat guild and channel history
#[derive(Parser, Debug)]
#[command(name = "pullcord", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Archive root (default: ./channels)
    #[arg(long, global = true)]
    pub archive: Option<PathBuf>,

    /// API token, sent verbatim ("Bot ..." for bot accounts)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull guilds and channels into the archive
    Pull(PullArgs),

    /// List visible guilds and their channels
    List {
        /// Only this guild
        guild: Option<String>,

        /// Guild names only, no channels
        #[arg(long)]
        summary: bool,
    },

    /// Show what the archive holds (offline)
    Status {
        /// Only this guild
        guild: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(clap::Args, Debug, Default)]
pub struct PullArgs {
    /// Only these guilds (comma-separated ids)
    #[arg(short = 'g', long = "guild")]
    pub guilds: Option<String>,

    /// Skip these guilds (comma-separated ids)
    #[arg(short = 'G', long = "exclude-guild")]
    pub exclude_guilds: Option<String>,

    /// Only these channels (comma-separated ids)
    #[arg(short = 'c', long = "channel")]
    pub channels: Option<String>,

    /// Skip these channels (comma-separated ids)
    #[arg(short = 'C', long = "exclude-channel")]
    pub exclude_channels: Option<String>,

    /// Do not download icons, avatars, emoji or attachments
    #[arg(long)]
    pub no_assets: bool,

    /// Re-read every channel from the start and record deleted messages
    #[arg(long)]
    pub rescan: bool,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
