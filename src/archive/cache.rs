//! State cache and reconciler.
//!
//! The cache is the "last known state" of a log: for every `(kind, id)` the
//! content fields of its most recent `add` row, with `del` rows removing the
//! entry. A sync session:
//!
//! 1. replays the log into a [`LogState`],
//! 2. snapshots the cached keys into [`DeletionCandidates`],
//! 3. offers every freshly observed entity to [`StateCache::observe`], which
//!    suppresses rows identical to the cached version and marks the key as
//!    still present,
//! 4. sweeps: every candidate not observed gets a synthetic `del` row.
//!
//! [`Reconciler`] ties these steps to one [`LogWriter`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::archive::file::{self, LogWriter};
use crate::archive::row::{self, EntityKind, Op, Row};
use crate::archive::types::{ArchiveResult, WriteStats};

/// Whether an observed row needs to be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Write,
    Suppress,
}

/// Compare content fields positionally.
///
/// When the lengths differ, the extra trailing fields of the longer side
/// must all be empty: a column added by a newer schema with no data is
/// not a change.
#[must_use]
pub fn fields_equal(a: &[String], b: &[String]) -> bool {
    let common = a.len().min(b.len());
    if a[..common] != b[..common] {
        return false;
    }
    let longer = if a.len() > b.len() { a } else { b };
    longer[common..].iter().all(String::is_empty)
}

/// Last known content fields per `(kind, id)`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StateCache {
    entries: BTreeMap<EntityKind, BTreeMap<String, Vec<String>>>,
}

impl StateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one replayed row: `add` stores, `del` removes.
    pub fn apply(&mut self, row: &Row) {
        match row.op {
            Op::Add => {
                self.entries
                    .entry(row.kind)
                    .or_default()
                    .insert(row.id.clone(), row.content.clone());
            }
            Op::Del => {
                self.remove(row.kind, &row.id);
            }
        }
    }

    #[must_use]
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&[String]> {
        self.entries.get(&kind)?.get(id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    fn remove(&mut self, kind: EntityKind, id: &str) -> Option<Vec<String>> {
        let ids = self.entries.get_mut(&kind)?;
        let removed = ids.remove(id);
        if ids.is_empty() {
            self.entries.remove(&kind);
        }
        removed
    }

    /// Number of cached entities of one kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entries.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Number of cached entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached keys, ordered by kind then id.
    pub fn keys(&self) -> impl Iterator<Item = (EntityKind, &str)> {
        self.entries
            .iter()
            .flat_map(|(kind, ids)| ids.keys().map(move |id| (*kind, id.as_str())))
    }

    /// Decide whether a freshly observed row must be written, updating the
    /// cache when it is.
    ///
    /// - unknown key, `add`: write and cache
    /// - unknown key, `del`: write (placeholder for an entity never added)
    /// - known key, `add` with equal content: suppress, cache untouched
    /// - known key, `add` with different content: write and cache
    /// - known key, `del`: write and remove
    pub fn observe(&mut self, row: &Row) -> Decision {
        let unchanged = row.op == Op::Add
            && self
                .get(row.kind, &row.id)
                .is_some_and(|cached| fields_equal(cached, &row.content));

        if unchanged {
            Decision::Suppress
        } else {
            self.apply(row);
            Decision::Write
        }
    }

    /// Emit a `del` row for every candidate left unobserved and drop it from
    /// the cache. Rows carry the last cached content and a fresh timestamp,
    /// ordered by kind then id.
    pub fn sweep(&mut self, candidates: DeletionCandidates) -> Vec<Row> {
        let now = row::timestamp();
        candidates
            .keys
            .into_iter()
            .filter_map(|(kind, id)| {
                let content = self.remove(kind, &id)?;
                Some(Row {
                    timestamp: now.clone(),
                    op: Op::Del,
                    kind,
                    id,
                    content,
                })
            })
            .collect()
    }

    /// SHA256 over the cached state, independent of row timestamps.
    ///
    /// Two archives that reconstruct to the same state share a fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (kind, ids) in &self.entries {
            for (id, content) in ids {
                hasher.update(kind.as_str().as_bytes());
                hasher.update([0]);
                hasher.update(id.as_bytes());
                for field in content {
                    hasher.update([0]);
                    hasher.update(field.as_bytes());
                }
                hasher.update([0xff]);
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Every id that has appeared in a log, per kind. Never shrinks.
///
/// Rows of either operation count, so a placeholder `del` row written for
/// an outside entity is remembered as well.
#[derive(Debug, Default, Clone)]
pub struct EverSeen {
    ids: HashMap<EntityKind, HashSet<String>>,
}

impl EverSeen {
    /// Record an id. Returns `true` if it had not been seen before.
    pub fn insert(&mut self, kind: EntityKind, id: &str) -> bool {
        let ids = self.ids.entry(kind).or_default();
        if ids.contains(id) {
            false
        } else {
            ids.insert(id.to_string())
        }
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.ids.get(&kind).is_some_and(|ids| ids.contains(id))
    }

    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.ids.get(&kind).map_or(0, HashSet::len)
    }
}

/// Everything reconstructed from one forward replay of a log.
#[derive(Debug, Default, Clone)]
pub struct LogState {
    pub cache: StateCache,
    pub ever_seen: EverSeen,
    /// Rows skipped as malformed during the replay.
    pub skipped: usize,
}

impl LogState {
    /// Apply one row to both the cache and the ever-seen set.
    pub fn apply(&mut self, row: &Row) {
        self.ever_seen.insert(row.kind, &row.id);
        self.cache.apply(row);
    }

    /// Replay a log file. A missing log yields an empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn load(path: &Path) -> ArchiveResult<Self> {
        let mut state = Self::default();
        state.skipped = file::replay_file(path, |row| state.apply(&row))?;
        Ok(state)
    }
}

/// Keys that were cached when a sync started and have not been observed
/// since.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionCandidates {
    keys: BTreeSet<(EntityKind, String)>,
}

impl DeletionCandidates {
    /// Snapshot every cached key.
    #[must_use]
    pub fn snapshot(cache: &StateCache) -> Self {
        Self {
            keys: cache.keys().map(|(k, id)| (k, id.to_string())).collect(),
        }
    }

    /// Snapshot the cached keys of the given kinds only.
    #[must_use]
    pub fn snapshot_kinds(cache: &StateCache, kinds: &[EntityKind]) -> Self {
        Self {
            keys: cache
                .keys()
                .filter(|(k, _)| kinds.contains(k))
                .map(|(k, id)| (k, id.to_string()))
                .collect(),
        }
    }

    /// The entity was seen upstream in this sync.
    pub fn observed(&mut self, kind: EntityKind, id: &str) {
        self.keys.remove(&(kind, id.to_string()));
    }

    /// Stop tracking a whole kind, e.g. when its listing was unavailable.
    pub fn forget_kind(&mut self, kind: EntityKind) {
        self.keys.retain(|(k, _)| *k != kind);
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.keys.contains(&(kind, id.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One log, its reconstructed state and the deletion snapshot of the
/// running sync.
///
/// The snapshot is taken on construction and consumed by
/// [`Reconciler::sweep`]; rows recorded afterwards are still reconciled
/// against the cache but can no longer cause deletions.
#[derive(Debug)]
pub struct Reconciler {
    writer: LogWriter,
    state: LogState,
    candidates: Option<DeletionCandidates>,
    stats: WriteStats,
}

impl Reconciler {
    /// Start a sync that may delete any entity currently cached.
    #[must_use]
    pub fn new(writer: LogWriter, state: LogState) -> Self {
        let candidates = DeletionCandidates::snapshot(&state.cache);
        Self::with_candidates(writer, state, candidates)
    }

    /// Start a sync with an explicit deletion snapshot.
    #[must_use]
    pub fn with_candidates(
        writer: LogWriter,
        state: LogState,
        candidates: DeletionCandidates,
    ) -> Self {
        Self {
            writer,
            state,
            candidates: Some(candidates),
            stats: WriteStats::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &LogState {
        &self.state
    }

    #[must_use]
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Record an id in the ever-seen set. Returns `true` if it is new.
    pub fn mark_seen(&mut self, kind: EntityKind, id: &str) -> bool {
        self.state.ever_seen.insert(kind, id)
    }

    /// Stop deletion tracking for a kind in the running sync.
    pub fn forget_kind(&mut self, kind: EntityKind) {
        if let Some(candidates) = self.candidates.as_mut() {
            candidates.forget_kind(kind);
        }
    }

    /// Reconcile an observed row against the cache and append it if it
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns an error if appending fails.
    pub fn record(&mut self, row: &Row) -> ArchiveResult<Decision> {
        if let Some(candidates) = self.candidates.as_mut() {
            candidates.observed(row.kind, &row.id);
        }

        let decision = self.state.cache.observe(row);
        match decision {
            Decision::Write => {
                self.writer.write_row(row)?;
                self.state.ever_seen.insert(row.kind, &row.id);
                self.stats.written += 1;
            }
            Decision::Suppress => self.stats.suppressed += 1,
        }
        Ok(decision)
    }

    /// Append a row without reconciling it (children of a message).
    ///
    /// # Errors
    ///
    /// Returns an error if appending fails.
    pub fn append(&mut self, row: &Row) -> ArchiveResult<()> {
        self.writer.write_row(row)?;
        self.state.ever_seen.insert(row.kind, &row.id);
        self.stats.appended += 1;
        Ok(())
    }

    /// Emit deletion rows for everything not observed since the snapshot,
    /// then sync the log. Returns the number of rows emitted; a second call
    /// emits nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if appending or syncing fails.
    pub fn sweep(&mut self) -> ArchiveResult<usize> {
        let Some(candidates) = self.candidates.take() else {
            return Ok(0);
        };

        let rows = self.state.cache.sweep(candidates);
        for row in &rows {
            self.writer.write_row(row)?;
        }
        self.stats.deleted += rows.len();
        self.writer.sync()?;
        Ok(rows.len())
    }

    /// Flush appended rows to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if `fsync` fails.
    pub fn sync(&mut self) -> ArchiveResult<()> {
        self.writer.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::entity::{Entity, RoleEntry};
    use tempfile::TempDir;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }

    fn row(op: Op, kind: EntityKind, id: &str, content: &[&str]) -> Row {
        Row {
            timestamp: row::timestamp(),
            op,
            kind,
            id: id.to_string(),
            content: s(content),
        }
    }

    #[test]
    fn test_fields_equal_exact() {
        assert!(fields_equal(&s(&["a", "b"]), &s(&["a", "b"])));
        assert!(!fields_equal(&s(&["a", "b"]), &s(&["a", "c"])));
    }

    #[test]
    fn test_fields_equal_tolerates_empty_trailing_columns() {
        assert!(fields_equal(&s(&["a", "b"]), &s(&["a", "b", ""])));
        assert!(fields_equal(&s(&["a", "b", "", ""]), &s(&["a", "b"])));
        assert!(!fields_equal(&s(&["a", "b"]), &s(&["a", "b", "x"])));
        assert!(!fields_equal(&s(&["a", "b", "x"]), &s(&["a", "b"])));
    }

    #[test]
    fn test_apply_add_then_del() {
        let mut cache = StateCache::new();
        cache.apply(&row(Op::Add, EntityKind::Role, "1", &["a"]));
        cache.apply(&row(Op::Add, EntityKind::Role, "1", &["b"]));
        assert_eq!(cache.get(EntityKind::Role, "1").unwrap(), s(&["b"]).as_slice());

        cache.apply(&row(Op::Del, EntityKind::Role, "1", &["b"]));
        assert!(!cache.contains(EntityKind::Role, "1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_observe_detects_hoist_change() {
        let mut cache = StateCache::new();
        cache.apply(&row(Op::Add, EntityKind::Role, "42", &["Admin", "1", "0", "8", "hoist"]));

        let fresh = Row::new(
            Op::Add,
            &Entity::Role(RoleEntry {
                id: "42".into(),
                name: "Admin".into(),
                color: 1,
                position: 0,
                permissions: "8".into(),
                hoist: false,
            }),
        );
        assert_eq!(cache.observe(&fresh), Decision::Write);
        assert_eq!(
            cache.get(EntityKind::Role, "42").unwrap(),
            s(&["Admin", "1", "0", "8", ""]).as_slice()
        );
    }

    #[test]
    fn test_observe_schema_growth() {
        let mut cache = StateCache::new();
        cache.apply(&row(Op::Add, EntityKind::Emoji, "1", &["a", "b"]));

        let grown = row(Op::Add, EntityKind::Emoji, "1", &["a", "b", ""]);
        assert_eq!(cache.observe(&grown), Decision::Suppress);
        // Suppression leaves the cached version alone.
        assert_eq!(cache.get(EntityKind::Emoji, "1").unwrap(), s(&["a", "b"]).as_slice());

        let changed = row(Op::Add, EntityKind::Emoji, "1", &["a", "b", "x"]);
        assert_eq!(cache.observe(&changed), Decision::Write);
    }

    #[test]
    fn test_observe_new_id_and_placeholder() {
        let mut cache = StateCache::new();
        assert_eq!(
            cache.observe(&row(Op::Add, EntityKind::User, "1", &["ann"])),
            Decision::Write
        );
        assert_eq!(
            cache.observe(&row(Op::Del, EntityKind::User, "2", &["bob"])),
            Decision::Write
        );
        assert!(!cache.contains(EntityKind::User, "2"));
    }

    #[test]
    fn test_sweep_emits_unobserved() {
        let mut cache = StateCache::new();
        cache.apply(&row(Op::Add, EntityKind::Message, "1", &["x"]));
        cache.apply(&row(Op::Add, EntityKind::Message, "2", &["y"]));

        let mut candidates = DeletionCandidates::snapshot(&cache);
        candidates.observed(EntityKind::Message, "1");

        let rows = cache.sweep(candidates);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].op, Op::Del);
        assert_eq!(rows[0].kind, EntityKind::Message);
        assert_eq!(rows[0].id, "2");
        assert_eq!(rows[0].content, s(&["y"]));
        assert!(cache.contains(EntityKind::Message, "1"));
        assert!(!cache.contains(EntityKind::Message, "2"));
    }

    #[test]
    fn test_snapshot_kinds_and_forget() {
        let mut cache = StateCache::new();
        cache.apply(&row(Op::Add, EntityKind::Message, "1", &[]));
        cache.apply(&row(Op::Add, EntityKind::Embed, "1", &["{}"]));
        cache.apply(&row(Op::Add, EntityKind::User, "5", &[]));

        let only_messages = DeletionCandidates::snapshot_kinds(&cache, &[EntityKind::Message]);
        assert_eq!(only_messages.len(), 1);
        assert!(only_messages.contains(EntityKind::Message, "1"));

        let mut all = DeletionCandidates::snapshot(&cache);
        all.forget_kind(EntityKind::User);
        assert_eq!(all.len(), 2);
        assert!(!all.contains(EntityKind::User, "5"));
    }

    #[test]
    fn test_fingerprint_ignores_timestamps() {
        let mut a = StateCache::new();
        let mut b = StateCache::new();
        let mut r = row(Op::Add, EntityKind::Role, "1", &["x"]);
        a.apply(&r);
        r.timestamp = "later".into();
        b.apply(&r);
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.apply(&row(Op::Add, EntityKind::Role, "1", &["y"]));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_ever_seen_counts_all_operations() {
        let mut state = LogState::default();
        state.apply(&row(Op::Add, EntityKind::User, "1", &[]));
        state.apply(&row(Op::Del, EntityKind::User, "1", &[]));
        state.apply(&row(Op::Del, EntityKind::User, "2", &[]));

        assert!(state.ever_seen.contains(EntityKind::User, "1"));
        assert!(state.ever_seen.contains(EntityKind::User, "2"));
        assert!(state.cache.is_empty());
    }

    #[test]
    fn test_reconciler_session() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("guild.tsv");

        {
            let mut rec = Reconciler::new(LogWriter::open(&path).unwrap(), LogState::default());
            rec.record(&row(Op::Add, EntityKind::Role, "1", &["a"])).unwrap();
            rec.record(&row(Op::Add, EntityKind::Role, "2", &["b"])).unwrap();
            assert_eq!(rec.sweep().unwrap(), 0);
        }

        let state = LogState::load(&path).unwrap();
        assert_eq!(state.cache.len(), 2);

        let mut rec = Reconciler::new(LogWriter::open(&path).unwrap(), state);
        assert_eq!(
            rec.record(&row(Op::Add, EntityKind::Role, "1", &["a"])).unwrap(),
            Decision::Suppress
        );
        assert_eq!(rec.sweep().unwrap(), 1);
        assert_eq!(rec.sweep().unwrap(), 0, "snapshot is consumed");
        assert_eq!(
            rec.stats(),
            WriteStats {
                written: 0,
                suppressed: 1,
                appended: 0,
                deleted: 1,
            }
        );

        let lines = std::fs::read_to_string(&path).unwrap();
        let last = Row::decode(lines.lines().last().unwrap()).unwrap();
        assert_eq!(last.op, Op::Del);
        assert_eq!(last.id, "2");

        let state = LogState::load(&path).unwrap();
        assert_eq!(state.cache.len(), 1);
        assert!(state.ever_seen.contains(EntityKind::Role, "2"));
    }
}
