//! In-memory upstream for pull tests.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};

use crate::pull::model::{Channel, Guild, Member, Message, PartialGuild, User};
use crate::pull::source::{
    Asset, AssetFetcher, DataSource, Fetched, SourceError, SourceResult, MISSING_ACCESS,
};

fn newer(id: &str, cursor: &str) -> bool {
    let id: u64 = id.parse().unwrap_or(0);
    let cursor: u64 = cursor.parse().unwrap_or(0);
    id > cursor
}

fn forbidden() -> SourceError {
    SourceError::Api {
        status: 403,
        code: Some(MISSING_ACCESS),
        message: "Missing Access".into(),
    }
}

/// A chat service held in memory. Ids are numeric strings.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    pub guilds: Vec<Guild>,
    /// Guild id to its channels.
    pub channels: HashMap<String, Vec<Channel>>,
    /// Guild id to its members.
    pub members: HashMap<String, Vec<Member>>,
    /// Channel id to its messages, oldest first.
    pub messages: HashMap<String, Vec<Message>>,
    /// `(message id, emoji api name)` to the reacting users.
    pub reactions: HashMap<(String, String), Vec<User>>,
    /// Guilds whose member list is forbidden.
    pub hidden_members: HashSet<String>,
    /// Channels whose history is forbidden.
    pub hidden_channels: HashSet<String>,
    /// Number of message pages served.
    pub message_pages: usize,
}

impl DataSource for MemorySource {
    fn guilds(&mut self, after: &str, limit: u32) -> SourceResult<Vec<PartialGuild>> {
        Ok(self
            .guilds
            .iter()
            .filter(|g| newer(&g.id, after))
            .take(limit as usize)
            .map(|g| PartialGuild {
                id: g.id.clone(),
                name: g.name.clone(),
            })
            .collect())
    }

    fn guild(&mut self, guild_id: &str) -> SourceResult<Guild> {
        self.guilds
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
            .ok_or_else(|| SourceError::Api {
                status: 404,
                code: None,
                message: "Unknown Guild".into(),
            })
    }

    fn channels(&mut self, guild_id: &str) -> SourceResult<Vec<Channel>> {
        Ok(self.channels.get(guild_id).cloned().unwrap_or_default())
    }

    fn members(&mut self, guild_id: &str, after: &str, limit: u32) -> SourceResult<Vec<Member>> {
        if self.hidden_members.contains(guild_id) {
            return Err(forbidden());
        }
        let mut members: Vec<Member> = self
            .members
            .get(guild_id)
            .into_iter()
            .flatten()
            .filter(|m| newer(&m.user.id, after))
            .cloned()
            .collect();
        members.sort_by_key(|m| m.user.id.parse::<u64>().unwrap_or(0));
        members.truncate(limit as usize);
        Ok(members)
    }

    fn messages(&mut self, channel_id: &str, after: &str, limit: u32) -> SourceResult<Vec<Message>> {
        if self.hidden_channels.contains(channel_id) {
            return Err(forbidden());
        }
        self.message_pages += 1;
        let mut page: Vec<Message> = self
            .messages
            .get(channel_id)
            .into_iter()
            .flatten()
            .filter(|m| newer(&m.id, after))
            .take(limit as usize)
            .cloned()
            .collect();
        page.reverse();
        Ok(page)
    }

    fn reaction_users(
        &mut self,
        _channel_id: &str,
        message_id: &str,
        emoji: &str,
        limit: u32,
    ) -> SourceResult<Vec<User>> {
        let users = self
            .reactions
            .get(&(message_id.to_string(), emoji.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(users.into_iter().take(limit as usize).collect())
    }
}

/// Records fetches instead of storing files.
#[derive(Debug, Default)]
pub struct RecordingFetcher {
    pub fetched: Vec<Asset>,
    /// Assets answered with 404.
    pub missing: HashSet<Asset>,
}

impl AssetFetcher for RecordingFetcher {
    fn fetch(&mut self, asset: &Asset) -> SourceResult<Fetched> {
        if self.missing.contains(asset) {
            return Err(SourceError::Api {
                status: 404,
                code: None,
                message: "Not Found".into(),
            });
        }
        self.fetched.push(asset.clone());
        Ok(Fetched::Downloaded)
    }
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.into(),
        username: name.into(),
        discriminator: "0001".into(),
        avatar: None,
    }
}

pub fn member(id: &str, name: &str, roles: &[&str]) -> Member {
    Member {
        user: user(id, name),
        nick: None,
        roles: roles.iter().map(ToString::to_string).collect(),
    }
}

pub fn message(id: &str, author: &str, content: &str) -> Message {
    from_json(json!({
        "id": id,
        "author": { "id": author, "username": format!("user{author}") },
        "content": content,
    }))
}

pub fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

/// Guild 1 with a text channel 100, a voice channel 101, two roles, one
/// emoji, two members and three messages in channel 100.
pub fn sample_source() -> MemorySource {
    let guild: Guild = from_json(json!({
        "id": "1",
        "name": "Home",
        "icon": "iconhash",
        "owner_id": "7",
        "afk_timeout": 300,
        "roles": [
            { "id": "1", "name": "@everyone", "color": 0, "position": 0, "permissions": "104324673", "hoist": false },
            { "id": "42", "name": "Admin", "color": 1, "position": 1, "permissions": "8", "hoist": true },
        ],
        "emojis": [
            { "id": "900", "name": "blob", "require_colons": true, "animated": false },
        ],
    }));

    let channels: Vec<Channel> = from_json(json!([
        {
            "id": "100", "guild_id": "1", "type": 0, "position": 0, "name": "general", "topic": "chat",
            "permission_overwrites": [ { "id": "42", "type": 0, "allow": "1024", "deny": "0" } ],
        },
        { "id": "101", "guild_id": "1", "type": 2, "position": 1, "name": "Voice" },
    ]));

    let mut first = message("1000", "7", "hello <:blob:900>");
    first.embeds = vec![json!({ "title": "link" })];
    first.attachments = from_json(json!([
        { "id": "5000", "filename": "a.png", "size": 10, "url": "https://cdn.example/attachments/100/5000/a.png" },
    ]));
    let mut second = message("1001", "8", "hi <@9>");
    second.mentions = vec![user("9", "outsider")];
    second.reactions = from_json(json!([
        { "count": 2, "emoji": { "id": null, "name": "👍" } },
    ]));
    let third = message("1002", "7", "bye");

    let mut source = MemorySource::default();
    source.guilds.push(guild);
    source.channels.insert("1".into(), channels);
    source.members.insert(
        "1".into(),
        vec![member("7", "ann", &["42"]), member("8", "bob", &[])],
    );
    source
        .messages
        .insert("100".into(), vec![first, second, third]);
    source.reactions.insert(
        ("1001".into(), "👍".into()),
        vec![user("7", "ann"), user("8", "bob")],
    );
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{
        channel_log_path, guild_log_path, replay_file, resume_cursor, EntityKind, LogWriter, Op,
        Row,
    };
    use crate::pull::{run, Filter, PullOptions, PullStats, Puller};
    use std::path::Path;
    use tempfile::TempDir;

    fn rows(path: &Path) -> Vec<Row> {
        let mut rows = Vec::new();
        replay_file(path, |row| rows.push(row)).unwrap();
        rows
    }

    fn pull(source: &mut MemorySource, root: &Path) -> PullStats {
        pull_with(source, &mut RecordingFetcher::default(), PullOptions::new(root))
    }

    fn pull_with(
        source: &mut MemorySource,
        fetcher: &mut RecordingFetcher,
        options: PullOptions,
    ) -> PullStats {
        run(source, fetcher, options, &Filter::default()).unwrap()
    }

    #[test]
    fn test_first_pull_writes_guild_and_channel_logs() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        let stats = pull(&mut source, temp.path());

        assert_eq!(stats.guilds, 1);
        assert_eq!(stats.channels, 1, "voice channels are not pulled");
        assert_eq!(stats.messages, 3);

        let guild_rows = rows(&guild_log_path(temp.path(), "1"));
        let kinds: Vec<EntityKind> = guild_rows.iter().map(|r| r.kind).collect();
        assert_eq!(kinds[0], EntityKind::Guild);
        assert_eq!(
            kinds.iter().filter(|k| **k == EntityKind::Channel).count(),
            2
        );
        let overwrite = guild_rows
            .iter()
            .find(|r| r.kind == EntityKind::PermOverwrite)
            .unwrap();
        assert_eq!(overwrite.id, "100:42");

        // The mentioned outsider gets a placeholder; members do not.
        let placeholders: Vec<&Row> = guild_rows
            .iter()
            .filter(|r| r.kind == EntityKind::User && r.op == Op::Del)
            .collect();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].id, "9");

        let channel_rows = rows(&channel_log_path(temp.path(), "1", "100"));
        let summary: Vec<(EntityKind, &str)> =
            channel_rows.iter().map(|r| (r.kind, r.id.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (EntityKind::Message, "1000"),
                (EntityKind::Embed, "1000"),
                (EntityKind::Attachment, "5000"),
                (EntityKind::Message, "1001"),
                (EntityKind::Reaction, "7"),
                (EntityKind::Reaction, "8"),
                (EntityKind::Message, "1002"),
            ]
        );
    }

    #[test]
    fn test_second_pull_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        pull(&mut source, temp.path());

        let guild_log = guild_log_path(temp.path(), "1");
        let channel_log = channel_log_path(temp.path(), "1", "100");
        let guild_before = std::fs::read(&guild_log).unwrap();
        let channel_before = std::fs::read(&channel_log).unwrap();

        let stats = pull(&mut source, temp.path());
        assert_eq!(stats.guild_rows.written, 0);
        assert_eq!(stats.guild_rows.deleted, 0);
        assert_eq!(stats.messages, 0);

        assert_eq!(std::fs::read(&guild_log).unwrap(), guild_before);
        assert_eq!(std::fs::read(&channel_log).unwrap(), channel_before);
    }

    #[test]
    fn test_role_change_appends_one_row() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        pull(&mut source, temp.path());
        let before = rows(&guild_log_path(temp.path(), "1")).len();

        source.guilds[0].roles[1].hoist = false;
        pull(&mut source, temp.path());

        let after = rows(&guild_log_path(temp.path(), "1"));
        assert_eq!(after.len(), before + 1);
        let last = after.last().unwrap();
        assert_eq!((last.op, last.kind, last.id.as_str()), (Op::Add, EntityKind::Role, "42"));
        assert_eq!(last.content, vec!["Admin", "1", "1", "8", ""]);
    }

    #[test]
    fn test_removed_entities_are_swept() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        pull(&mut source, temp.path());

        source.guilds[0].roles.truncate(1);
        source.members.get_mut("1").unwrap().retain(|m| m.user.id != "8");
        let stats = pull(&mut source, temp.path());
        assert_eq!(stats.guild_rows.deleted, 2);

        let all = rows(&guild_log_path(temp.path(), "1"));
        let deleted: Vec<(EntityKind, &str)> = all[all.len() - 2..]
            .iter()
            .map(|r| {
                assert_eq!(r.op, Op::Del);
                (r.kind, r.id.as_str())
            })
            .collect();
        assert_eq!(deleted, vec![(EntityKind::User, "8"), (EntityKind::Role, "42")]);
    }

    #[test]
    fn test_hidden_member_list_deletes_no_users() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        pull(&mut source, temp.path());

        source.hidden_members.insert("1".into());
        let stats = pull(&mut source, temp.path());
        assert_eq!(stats.guild_rows.deleted, 0);
        assert_eq!(stats.channels, 1);
    }

    #[test]
    fn test_resume_pulls_only_new_messages() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        pull(&mut source, temp.path());

        source
            .messages
            .get_mut("100")
            .unwrap()
            .push(message("1003", "8", "later"));
        let stats = pull(&mut source, temp.path());
        assert_eq!(stats.messages, 1);

        let ids: Vec<String> = rows(&channel_log_path(temp.path(), "1", "100"))
            .into_iter()
            .filter(|r| r.kind == EntityKind::Message)
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["1000", "1001", "1002", "1003"]);
    }

    #[test]
    fn test_rescan_detects_deleted_and_edited_messages() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        pull(&mut source, temp.path());
        let before = rows(&channel_log_path(temp.path(), "1", "100")).len();

        let history = source.messages.get_mut("100").unwrap();
        history.retain(|m| m.id != "1001");
        history[1].content = "bye!".into();
        history[1].edited_timestamp = Some("2024-05-02T00:00:00+00:00".into());

        let mut options = PullOptions::new(temp.path());
        options.rescan = true;
        let stats = pull_with(&mut source, &mut RecordingFetcher::default(), options);
        assert_eq!(stats.channel_rows.written, 1);
        assert_eq!(stats.channel_rows.suppressed, 1);
        assert_eq!(stats.channel_rows.deleted, 1);

        let after = rows(&channel_log_path(temp.path(), "1", "100"));
        assert_eq!(after.len(), before + 2);
        let edited = &after[before];
        assert_eq!((edited.op, edited.id.as_str()), (Op::Add, "1002"));
        assert_eq!(edited.content[3], "bye!");
        let deleted = &after[before + 1];
        assert_eq!((deleted.op, deleted.kind, deleted.id.as_str()), (Op::Del, EntityKind::Message, "1001"));
    }

    #[test]
    fn test_rescan_of_older_edit_keeps_resume_cursor() {
        let temp = TempDir::new().unwrap();
        let channel_log = channel_log_path(temp.path(), "1", "100");
        let mut source = sample_source();
        pull(&mut source, temp.path());

        let history = source.messages.get_mut("100").unwrap();
        history[0].content = "hello again".into();
        history[0].edited_timestamp = Some("2024-05-02T00:00:00+00:00".into());

        let mut options = PullOptions::new(temp.path());
        options.rescan = true;
        let stats = pull_with(&mut source, &mut RecordingFetcher::default(), options.clone());
        assert_eq!(stats.channel_rows.written, 1);
        assert_eq!(stats.channel_rows.appended, 1);
        assert_eq!(stats.channel_rows.deleted, 0);
        assert_eq!(resume_cursor(&channel_log).unwrap().as_deref(), Some("1002"));

        let last = rows(&channel_log).pop().unwrap();
        assert_eq!((last.op, last.kind, last.id.as_str()), (Op::Add, EntityKind::Message, "1002"));

        // Nothing changed upstream since the rescan.
        let before = std::fs::read(&channel_log).unwrap();
        let stats = pull(&mut source, temp.path());
        assert_eq!(stats.messages, 0);
        assert_eq!(stats.channel_rows.total_rows(), 0);
        assert_eq!(std::fs::read(&channel_log).unwrap(), before);

        let stats = pull_with(&mut source, &mut RecordingFetcher::default(), options);
        assert_eq!(stats.channel_rows.total_rows(), 0);
        assert_eq!(stats.channel_rows.suppressed, 3);
        assert_eq!(std::fs::read(&channel_log).unwrap(), before);
    }

    #[test]
    fn test_reaction_overflow_rows() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        let history = source.messages.get_mut("100").unwrap();
        history[2].reactions = from_json(json!([{ "count": 137, "emoji": { "id": "901", "name": "party", "animated": true } }]));
        let users: Vec<User> = (2000..2100).map(|i| user(&i.to_string(), "fan")).collect();
        source
            .reactions
            .insert(("1002".into(), "party:901".into()), users);

        let mut fetcher = RecordingFetcher::default();
        pull_with(&mut source, &mut fetcher, PullOptions::new(temp.path()));

        let reactions: Vec<Row> = rows(&channel_log_path(temp.path(), "1", "100"))
            .into_iter()
            .filter(|r| r.kind == EntityKind::Reaction && r.content[0] == "1002")
            .collect();
        assert_eq!(reactions.len(), 101);
        let overflow = reactions.last().unwrap();
        assert_eq!(overflow.id, "");
        assert_eq!(overflow.content, vec!["1002", "party:901", "37"]);
        assert!(fetcher.fetched.contains(&Asset::Emoji {
            id: "901".into(),
            animated: true
        }));
    }

    #[test]
    fn test_forbidden_channel_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        let mut extra: Channel = from_json(json!({ "id": "102", "guild_id": "1", "type": 0, "name": "secret" }));
        extra.position = 2;
        source.channels.get_mut("1").unwrap().push(extra);
        source.hidden_channels.insert("100".into());

        let stats = pull(&mut source, temp.path());
        assert_eq!(stats.channels_skipped, 1);
        assert_eq!(stats.channels, 1);
        // Logs are created on their first row only.
        assert!(!channel_log_path(temp.path(), "1", "100").exists());
        assert!(!channel_log_path(temp.path(), "1", "102").exists());
    }

    #[test]
    fn test_locked_guild_log_fails_channel() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        let _held = LogWriter::open_locked(&guild_log_path(temp.path(), "1")).unwrap();

        let stats = pull(&mut source, temp.path());
        assert_eq!(stats.channels_failed, 1);
        assert_eq!(stats.channels, 0);
    }

    #[test]
    fn test_filter_excludes_channels() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        let filter = Filter::from_lists(None, None, None, Some("100"));
        let stats = run(
            &mut source,
            &mut RecordingFetcher::default(),
            PullOptions::new(temp.path()),
            &filter,
        )
        .unwrap();
        assert_eq!(stats.channels, 0);
        assert!(!guild_log_path(temp.path(), "1").exists());
    }

    #[test]
    fn test_assets_are_fetched_once() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        let mut fetcher = RecordingFetcher::default();
        let missing = Asset::Attachment {
            url: "https://cdn.example/attachments/100/5000/a.png".into(),
        };
        fetcher.missing.insert(missing);

        let stats = pull_with(&mut source, &mut fetcher, PullOptions::new(temp.path()));

        let emoji_fetches = fetcher
            .fetched
            .iter()
            .filter(|a| matches!(a, Asset::Emoji { id, .. } if id == "900"))
            .count();
        assert_eq!(emoji_fetches, 1, "guild emoji and content reference share a fetch");
        assert!(fetcher.fetched.contains(&Asset::Icon {
            guild_id: "1".into(),
            hash: "iconhash".into()
        }));
        assert_eq!(stats.assets_skipped, 1);
        assert_eq!(stats.assets_downloaded, fetcher.fetched.len());
        // The attachment row is still written.
        assert!(rows(&channel_log_path(temp.path(), "1", "100"))
            .iter()
            .any(|r| r.kind == EntityKind::Attachment));
    }

    #[test]
    fn test_light_mode_fetches_nothing() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        let mut fetcher = RecordingFetcher::default();
        let mut options = PullOptions::new(temp.path());
        options.assets = false;

        let stats = pull_with(&mut source, &mut fetcher, options);
        assert!(fetcher.fetched.is_empty());
        assert_eq!(stats.messages, 3);
    }

    #[test]
    fn test_puller_syncs_guild_once() {
        let temp = TempDir::new().unwrap();
        let mut source = sample_source();
        let mut fetcher = RecordingFetcher::default();
        let channel = source.channels["1"][0].clone();

        let mut puller = Puller::new(&mut source, &mut fetcher, PullOptions::new(temp.path()));
        puller.pull_channel("1", &channel).unwrap();
        puller.pull_channel("1", &channel).unwrap();
        let stats = puller.finish();

        assert_eq!(stats.guilds, 1);
        assert_eq!(stats.messages, 3);
        assert_eq!(source.message_pages, 3, "one empty page ends each channel pull");
    }
}
