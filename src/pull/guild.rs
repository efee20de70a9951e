//! Guild metadata sync.

use crate::archive::{Entity, EntityKind};
use crate::pull::source::{Asset, AssetFetcher, DataSource, MEMBER_PAGE_LIMIT};
use crate::pull::{GuildPhase, GuildSession, PullError, PullResult, Puller};

impl<S: DataSource, F: AssetFetcher> Puller<'_, S, F> {
    /// Record the guild, its channels, overwrites, roles, emoji and members,
    /// then emit deletions for whatever was not seen.
    pub(super) fn sync_guild(&mut self, session: &mut GuildSession) -> PullResult<()> {
        session.enter(GuildPhase::SyncingMetadata);
        let guild_id = session.guild_id.clone();

        let guild = self.source.guild(&guild_id)?;
        if let Some(hash) = &guild.icon {
            self.fetch_asset(Asset::Icon {
                guild_id: guild_id.clone(),
                hash: hash.clone(),
            })?;
        }
        if let Some(hash) = &guild.splash {
            self.fetch_asset(Asset::Splash {
                guild_id: guild_id.clone(),
                hash: hash.clone(),
            })?;
        }
        session.record(&Entity::Guild(guild.entry()))?;

        for channel in self.source.channels(&guild_id)? {
            session.record(&Entity::Channel(channel.entry()))?;
            for overwrite in &channel.permission_overwrites {
                session.record(&Entity::PermOverwrite(overwrite.entry(&channel.id)))?;
            }
        }

        for role in &guild.roles {
            session.record(&Entity::Role(role.entry()))?;
        }

        for emoji in &guild.emojis {
            let Some(id) = &emoji.id else { continue };
            self.fetch_asset(Asset::Emoji {
                id: id.clone(),
                animated: emoji.animated,
            })?;
            session.record(&Entity::Emoji(emoji.entry()))?;
        }

        session.enter(GuildPhase::SyncingMembers);
        match self.sync_members(session) {
            Ok(count) => tracing::info!("[{guild_id}] {count} members"),
            Err(PullError::Source(e)) if e.is_skippable() => {
                // Without a full member list, absent users are not deletions.
                tracing::warn!("[{guild_id}] cannot list members: {e}");
                session.reconciler.forget_kind(EntityKind::User);
            }
            Err(e) => return Err(e),
        }
        session.reconciler.sync()?;

        session.enter(GuildPhase::DeletionSweep);
        let deleted = session.reconciler.sweep()?;
        if deleted > 0 {
            tracing::info!("[{guild_id}] {deleted} entities gone since the last pull");
        }

        session.enter(GuildPhase::Done);
        Ok(())
    }

    /// Page through all members. Returns how many were seen.
    fn sync_members(&mut self, session: &mut GuildSession) -> PullResult<usize> {
        let guild_id = session.guild_id.clone();
        let mut after = "0".to_string();
        let mut total = 0;

        loop {
            let members = self.source.members(&guild_id, &after, MEMBER_PAGE_LIMIT)?;
            let Some(last) = members.last() else { break };
            after = last.user.id.clone();

            for member in &members {
                if let Some(hash) = &member.user.avatar {
                    self.fetch_asset(Asset::Avatar {
                        user_id: member.user.id.clone(),
                        hash: hash.clone(),
                    })?;
                }
                session.reconciler.mark_seen(EntityKind::User, &member.user.id);
                session.record(&Entity::User(member.entry()))?;
            }

            total += members.len();
            tracing::info!(
                "[{guild_id}] downloaded {} members, last id {after} with name {}",
                members.len(),
                last.user.username
            );
        }

        Ok(total)
    }
}
