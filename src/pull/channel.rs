//! Channel message sync.

use std::sync::LazyLock;

use regex::Regex;

use crate::archive::{
    channel_log_path, resume_cursor, Decision, DeletionCandidates, Entity, EntityKind, LogState,
    LogWriter, Op, ReactionEntry, Reconciler, Row,
};
use crate::pull::model::{embed_entry, Channel, Message, User};
use crate::pull::source::{
    Asset, AssetFetcher, DataSource, MESSAGE_PAGE_LIMIT, REACTION_PAGE_LIMIT,
};
use crate::pull::{ChannelPhase, GuildSession, PullResult, Puller};

/// `<:name:id>` and `<a:name:id>` references in message content.
static CUSTOM_EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(a?):[^:>]+:([0-9]+)>").expect("custom emoji pattern is valid")
});

/// Custom emoji referenced in message content, as `(id, animated)`.
#[must_use]
pub fn custom_emoji(content: &str) -> Vec<(String, bool)> {
    CUSTOM_EMOJI
        .captures_iter(content)
        .map(|caps| (caps[2].to_string(), !caps[1].is_empty()))
        .collect()
}

/// Reaction rows for one emoji on one message.
///
/// One row per enumerated user (at most a page), plus a single row with an
/// empty user id for the reactions beyond the page.
#[must_use]
pub fn reaction_entries(
    message_id: &str,
    emoji: &str,
    count: u64,
    users: &[User],
) -> Vec<ReactionEntry> {
    let limit = u64::from(REACTION_PAGE_LIMIT);
    let mut entries: Vec<ReactionEntry> = users
        .iter()
        .take(REACTION_PAGE_LIMIT as usize)
        .map(|user| ReactionEntry {
            user_id: user.id.clone(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
            count: 1,
        })
        .collect();

    if count > limit {
        entries.push(ReactionEntry {
            user_id: String::new(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
            count: count - limit,
        });
    }

    entries
}

impl<S: DataSource, F: AssetFetcher> Puller<'_, S, F> {
    /// Pull a channel's new messages into its log.
    ///
    /// In resume mode paging starts after the last logged message and every
    /// row is appended. In rescan mode paging starts from the beginning,
    /// message rows are reconciled against the replayed channel log, and
    /// messages no longer upstream get deletion rows.
    pub(super) fn sync_channel(
        &mut self,
        session: &mut GuildSession,
        channel: &Channel,
    ) -> PullResult<()> {
        let guild_id = session.guild_id.clone();
        let path = channel_log_path(&self.options.root, &guild_id, &channel.id);
        let rescan = self.options.rescan;
        let mut phase = ChannelPhase::Uninitialized;

        let (mut after, state, candidates) = if rescan {
            let state = LogState::load(&path)?;
            let candidates = DeletionCandidates::snapshot_kinds(&state.cache, &[EntityKind::Message]);
            ("0".to_string(), state, candidates)
        } else {
            let cursor = resume_cursor(&path)?.unwrap_or_else(|| "0".to_string());
            (cursor, LogState::default(), DeletionCandidates::default())
        };
        // Id of the last message row in the log, i.e. the next resume cursor.
        let mut tail = if rescan { resume_cursor(&path)? } else { None };
        enter(&guild_id, &channel.id, &mut phase, ChannelPhase::ResumeCursorResolved);
        tracing::debug!("[{guild_id}/{}] resuming after {after}", channel.id);

        let mut log = Reconciler::with_candidates(LogWriter::deferred(&path), state, candidates);
        let mut newest: Option<Message> = None;

        enter(&guild_id, &channel.id, &mut phase, ChannelPhase::Paging);
        loop {
            let mut messages = self
                .source
                .messages(&channel.id, &after, MESSAGE_PAGE_LIMIT)?;
            if messages.is_empty() {
                break;
            }

            // Pages arrive newest first.
            after = messages[0].id.clone();
            newest = Some(messages[0].clone());
            messages.reverse();

            for message in &messages {
                if self.emit_message(session, &mut log, channel, message)? {
                    tail = Some(message.id.clone());
                }
            }

            self.stats.messages += messages.len();
            tracing::info!(
                "[{guild_id}/{}] downloaded {} messages, last id {after} with content {}",
                channel.id,
                messages.len(),
                newest.as_ref().map_or("", |m| m.content.as_str())
            );
        }

        if rescan {
            // Edits land in upstream order; the log must still end on the
            // newest message so the next resume does not re-page history.
            if let Some(message) = newest.filter(|m| is_after(&m.id, tail.as_deref())) {
                log.append(&Row::new(Op::Add, &Entity::Message(message.entry())))?;
            }
            let deleted = log.sweep()?;
            if deleted > 0 {
                tracing::info!("[{guild_id}/{}] {deleted} messages deleted upstream", channel.id);
            }
        } else {
            log.sync()?;
        }
        session.reconciler.sync()?;

        self.stats.channel_rows.merge(&log.stats());
        enter(&guild_id, &channel.id, &mut phase, ChannelPhase::Done);
        Ok(())
    }

    /// Log one message and its children. Returns whether the message row
    /// itself was written.
    fn emit_message(
        &mut self,
        session: &mut GuildSession,
        log: &mut Reconciler,
        channel: &Channel,
        message: &Message,
    ) -> PullResult<bool> {
        let row = Row::new(Op::Add, &Entity::Message(message.entry()));
        let with_children = if self.options.rescan {
            log.record(&row)? == Decision::Write
        } else {
            log.append(&row)?;
            true
        };

        self.placeholder(session, &message.author)?;
        for user in &message.mentions {
            self.placeholder(session, user)?;
        }

        for (id, animated) in custom_emoji(&message.content) {
            self.fetch_asset(Asset::Emoji { id, animated })?;
        }

        for attachment in &message.attachments {
            self.fetch_asset(Asset::Attachment {
                url: attachment.url.clone(),
            })?;
        }

        if !with_children {
            return Ok(false);
        }

        for embed in &message.embeds {
            log.append(&Row::new(Op::Add, &Entity::Embed(embed_entry(&message.id, embed))))?;
        }

        for attachment in &message.attachments {
            log.append(&Row::new(
                Op::Add,
                &Entity::Attachment(attachment.entry(&message.id)),
            ))?;
        }

        for reaction in &message.reactions {
            if let Some(id) = &reaction.emoji.id {
                self.fetch_asset(Asset::Emoji {
                    id: id.clone(),
                    animated: reaction.emoji.animated,
                })?;
            }

            let emoji = reaction.emoji.api_name();
            let users = match self.source.reaction_users(
                &channel.id,
                &message.id,
                &emoji,
                REACTION_PAGE_LIMIT,
            ) {
                Ok(users) => users,
                Err(e) if e.is_skippable() => {
                    tracing::warn!(
                        "[{}/{}] skipping reaction {emoji} on {}: {e}",
                        session.guild_id,
                        channel.id,
                        message.id
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            for entry in reaction_entries(&message.id, &emoji, reaction.count, &users) {
                log.append(&Row::new(Op::Add, &Entity::Reaction(entry)))?;
            }
        }

        Ok(true)
    }

    /// Give a user outside the member list a `del user` row, once.
    fn placeholder(&mut self, session: &mut GuildSession, user: &User) -> PullResult<()> {
        if session
            .reconciler
            .state()
            .ever_seen
            .contains(EntityKind::User, &user.id)
        {
            return Ok(());
        }
        session
            .reconciler
            .record(&Row::new(Op::Del, &Entity::User(user.placeholder_entry())))?;
        Ok(())
    }
}

/// Whether snowflake `id` sorts after `other`. Ids compare by length, then
/// lexically.
fn is_after(id: &str, other: Option<&str>) -> bool {
    other.is_none_or(|other| (id.len(), id) > (other.len(), other))
}

fn enter(guild_id: &str, channel_id: &str, phase: &mut ChannelPhase, next: ChannelPhase) {
    tracing::debug!(guild = guild_id, channel = channel_id, from = ?*phase, to = ?next, "channel phase");
    *phase = next;
}
