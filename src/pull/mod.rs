//! Guild and channel synchronization.
//!
//! A [`Puller`] walks the channels it is given. The first channel of each
//! guild triggers a guild sync (metadata, members, deletion sweep) against
//! `guild.tsv`; every channel then pulls its new messages into its own log.
//!
//! # Guild session
//!
//! ```text
//! Uninitialized -> LogOpened -> CacheLoaded -> SyncingMetadata
//!     -> SyncingMembers -> DeletionSweep -> Done
//! ```
//!
//! The guild log stays open (and locked) while that guild's channels are
//! pulled, so users referenced by messages can get placeholder rows.
//!
//! # Channel session
//!
//! ```text
//! Uninitialized -> ResumeCursorResolved -> Paging -> Done
//! ```
//!
//! Upstream access goes through [`DataSource`]; asset files through
//! [`AssetFetcher`]. Neither knows about logs.

mod channel;
mod filter;
mod guild;
pub mod model;
mod source;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::archive::{
    guild_log_path, ArchiveError, Decision, Entity, LogState, LogWriter, Op, Reconciler, Row,
    WriteStats,
};

pub use channel::{custom_emoji, reaction_entries};
pub use filter::{parse_ids, Filter};
pub use model::{Channel, PartialGuild};
pub use source::{
    Asset, AssetFetcher, DataSource, Fetched, SourceError, SourceResult, GUILD_PAGE_LIMIT,
    MEMBER_PAGE_LIMIT, MESSAGE_PAGE_LIMIT, MISSING_ACCESS, REACTION_PAGE_LIMIT, UNKNOWN_EMOJI,
};

/// Errors that abort a guild or channel session.
#[derive(Debug, thiserror::Error)]
pub enum PullError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl PullError {
    /// See [`SourceError::is_skippable`]. Archive errors never are.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Source(e) if e.is_skippable())
    }
}

/// Result type for pull operations.
pub type PullResult<T> = std::result::Result<T, PullError>;

/// How a pull behaves.
#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Archive root holding one directory per guild.
    pub root: PathBuf,
    /// Fetch icons, avatars, emoji and attachments.
    pub assets: bool,
    /// Re-page every channel from the start and detect deleted messages.
    pub rescan: bool,
}

impl PullOptions {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            assets: true,
            rescan: false,
        }
    }
}

/// Counters for a whole run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PullStats {
    pub guilds: usize,
    pub channels: usize,
    pub channels_skipped: usize,
    pub channels_failed: usize,
    pub messages: usize,
    pub assets_downloaded: usize,
    pub assets_present: usize,
    pub assets_skipped: usize,
    pub guild_rows: WriteStats,
    pub channel_rows: WriteStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuildPhase {
    Uninitialized,
    LogOpened,
    CacheLoaded,
    SyncingMetadata,
    SyncingMembers,
    DeletionSweep,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Uninitialized,
    ResumeCursorResolved,
    Paging,
    Done,
}

/// The open guild log of the guild currently being pulled.
#[derive(Debug)]
struct GuildSession {
    guild_id: String,
    reconciler: Reconciler,
    phase: GuildPhase,
}

impl GuildSession {
    fn open(root: &std::path::Path, guild_id: &str) -> PullResult<Self> {
        let path = guild_log_path(root, guild_id);
        tracing::debug!(guild = guild_id, phase = ?GuildPhase::Uninitialized, "guild phase");

        let writer = LogWriter::open_locked(&path)?;
        tracing::debug!(guild = guild_id, phase = ?GuildPhase::LogOpened, "guild phase");

        let state = LogState::load(&path)?;
        if state.skipped > 0 {
            tracing::warn!(
                guild = guild_id,
                skipped = state.skipped,
                "skipped malformed rows in guild log"
            );
        }
        tracing::debug!(
            guild = guild_id,
            phase = ?GuildPhase::CacheLoaded,
            cached = state.cache.len(),
            "guild phase"
        );

        Ok(Self {
            guild_id: guild_id.to_string(),
            reconciler: Reconciler::new(writer, state),
            phase: GuildPhase::CacheLoaded,
        })
    }

    fn enter(&mut self, phase: GuildPhase) {
        tracing::debug!(guild = %self.guild_id, from = ?self.phase, to = ?phase, "guild phase");
        self.phase = phase;
    }

    fn record(&mut self, entity: &Entity) -> PullResult<Decision> {
        Ok(self.reconciler.record(&Row::new(Op::Add, entity))?)
    }
}

/// Drives guild and channel sessions against one archive root.
pub struct Puller<'a, S, F> {
    source: &'a mut S,
    fetcher: &'a mut F,
    options: PullOptions,
    session: Option<GuildSession>,
    pulled_guilds: HashSet<String>,
    fetched: HashSet<Asset>,
    stats: PullStats,
}

impl<'a, S: DataSource, F: AssetFetcher> Puller<'a, S, F> {
    pub fn new(source: &'a mut S, fetcher: &'a mut F, options: PullOptions) -> Self {
        Self {
            source,
            fetcher,
            options,
            session: None,
            pulled_guilds: HashSet::new(),
            fetched: HashSet::new(),
            stats: PullStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &PullStats {
        &self.stats
    }

    /// Pull one channel, syncing its guild first if this puller has not
    /// done so yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the guild log is locked or unreadable, or if an
    /// upstream call fails with a non-skippable error.
    pub fn pull_channel(&mut self, guild_id: &str, channel: &Channel) -> PullResult<()> {
        let mut session = self.take_session(guild_id)?;

        let result = self.pull_with_session(&mut session, channel);
        self.session = Some(session);
        result
    }

    fn pull_with_session(&mut self, session: &mut GuildSession, channel: &Channel) -> PullResult<()> {
        // A failed guild sync is not retried for the guild's other channels.
        if self.pulled_guilds.insert(session.guild_id.clone()) {
            self.sync_guild(session)?;
            self.stats.guilds += 1;
        }
        self.sync_channel(session, channel)
    }

    /// Close the open guild log and return the run's counters.
    #[must_use]
    pub fn finish(mut self) -> PullStats {
        if let Some(session) = self.session.take() {
            self.close_session(session);
        }
        self.stats
    }

    fn take_session(&mut self, guild_id: &str) -> PullResult<GuildSession> {
        match self.session.take() {
            Some(session) if session.guild_id == guild_id => return Ok(session),
            Some(session) => self.close_session(session),
            None => {}
        }
        GuildSession::open(&self.options.root, guild_id)
    }

    fn close_session(&mut self, session: GuildSession) {
        self.stats.guild_rows.merge(&session.reconciler.stats());
    }

    /// Fetch an asset at most once per puller. Skippable failures are
    /// logged and counted.
    fn fetch_asset(&mut self, asset: Asset) -> PullResult<()> {
        if !self.options.assets || self.fetched.contains(&asset) {
            return Ok(());
        }

        match self.fetcher.fetch(&asset) {
            Ok(Fetched::Downloaded) => {
                tracing::debug!(asset = %asset, "downloaded");
                self.stats.assets_downloaded += 1;
            }
            Ok(Fetched::AlreadyPresent) => self.stats.assets_present += 1,
            Err(e) if e.is_skippable() => {
                tracing::warn!(asset = %asset, error = %e, "skipping asset");
                self.stats.assets_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }

        self.fetched.insert(asset);
        Ok(())
    }
}

/// Every guild of the current account, following the list cursor.
///
/// # Errors
///
/// Returns an error if a page cannot be fetched.
pub fn list_guilds<S: DataSource>(source: &mut S) -> SourceResult<Vec<PartialGuild>> {
    let mut guilds = Vec::new();
    let mut after = "0".to_string();

    loop {
        let page = source.guilds(&after, GUILD_PAGE_LIMIT)?;
        let Some(last) = page.last() else { break };
        after = last.id.clone();
        guilds.extend(page);
    }

    Ok(guilds)
}

/// Text channels selected by `filter`, paired with their guild id.
///
/// Guilds whose channel list is hidden are skipped with a warning.
///
/// # Errors
///
/// Returns an error if listing guilds or channels fails otherwise.
pub fn wanted_channels<S: DataSource>(
    source: &mut S,
    filter: &Filter,
) -> SourceResult<Vec<(String, Channel)>> {
    let mut wanted = Vec::new();

    for guild in list_guilds(source)? {
        if !filter.wants_guild(&guild.id) {
            continue;
        }

        let channels = match source.channels(&guild.id) {
            Ok(channels) => channels,
            Err(e) if e.is_skippable() => {
                tracing::warn!(guild = %guild.id, error = %e, "skipping guild");
                continue;
            }
            Err(e) => return Err(e),
        };

        wanted.extend(
            channels
                .into_iter()
                .filter(|c| c.is_text() && filter.wants_channel(&c.id))
                .map(|c| (guild.id.clone(), c)),
        );
    }

    Ok(wanted)
}

/// Pull every wanted channel. A failing channel is logged and counted, and
/// the run continues with the next one.
///
/// # Errors
///
/// Returns an error only if the channel list itself cannot be built.
pub fn run<S: DataSource, F: AssetFetcher>(
    source: &mut S,
    fetcher: &mut F,
    options: PullOptions,
    filter: &Filter,
) -> PullResult<PullStats> {
    let channels = wanted_channels(source, filter)?;
    tracing::info!(channels = channels.len(), "starting pull");

    let mut puller = Puller::new(source, fetcher, options);
    for (guild_id, channel) in &channels {
        match puller.pull_channel(guild_id, channel) {
            Ok(()) => puller.stats.channels += 1,
            Err(e) if e.is_skippable() => {
                tracing::warn!("[{guild_id}/{}] skipping channel: {e}", channel.id);
                puller.stats.channels_skipped += 1;
            }
            Err(e) => {
                tracing::error!("[{guild_id}/{}] channel sync failed: {e}", channel.id);
                puller.stats.channels_failed += 1;
            }
        }
    }

    Ok(puller.finish())
}
