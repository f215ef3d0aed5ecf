//! Snapshot Engine: create, list, restore, rollback, delete and prune.
//!
//! Each operation holds the catalog lock for its whole read-modify-write
//! cycle. Records are located on the shelf by their message, which embeds
//! the record's stable key, so a stale positional `id` never selects the
//! wrong shelf entry. Every mutation rewrites the surviving ids to the
//! positions git reports afterwards.

use crate::config::Config;
use crate::error::{Result, SnapError};
use crate::paths;
use crate::snapshot::{evict_auto, insert_newest, Origin, SnapshotRecord, KEY_LEN};
use crate::store::MetadataStore;
use crate::vcs::{GitVcs, ShelfEntry, Vcs};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(SnapshotRecord),
    /// Working tree clean; nothing was shelved or written.
    NothingToSnapshot,
}

/// A catalog record as seen against the live shelf list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotView {
    #[serde(flatten)]
    pub record: SnapshotRecord,
    /// The shelf entry was removed outside snapguard.
    pub orphaned: bool,
}

pub struct Engine<V> {
    vcs: V,
    store: MetadataStore,
    config: Config,
}

impl Engine<GitVcs> {
    /// Engine over the git repository at `root`, configured from `root`.
    /// snapguard's own config, catalog and lock files never count as changes.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let store = MetadataStore::open(config.catalog_file(root));
        let vcs = GitVcs::new(root)?
            .include_untracked(config.include_untracked)
            .exclude(&paths::config_path(root))
            .exclude(store.path())
            .exclude(&store.lock_path());
        Ok(Self::new(vcs, store, config))
    }
}

impl<V: Vcs> Engine<V> {
    pub fn new(vcs: V, store: MetadataStore, config: Config) -> Self {
        Self { vcs, store, config }
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    pub fn create(&self, description: &str) -> Result<CreateOutcome> {
        self.create_with(Origin::Manual, description)
    }

    /// Automatic snapshot for `operation`; trims automatic records to the cap.
    pub fn create_auto(&self, operation: &str) -> Result<CreateOutcome> {
        self.create_with(Origin::Auto, operation)
    }

    fn create_with(&self, origin: Origin, label: &str) -> Result<CreateOutcome> {
        self.require_repo()?;
        let _lock = self.store.lock()?;

        if !self.vcs.is_dirty()? {
            tracing::debug!("working tree clean, no snapshot created");
            return Ok(CreateOutcome::NothingToSnapshot);
        }

        let mut catalog = self.store.read();
        let now = strictly_after(Utc::now(), catalog.first().map(|r| r.timestamp));
        let record = SnapshotRecord::new(origin, label, now);

        self.vcs.shelve(&record.message)?;
        let shelves = self.vcs.list_shelves()?;
        match shelves.first() {
            Some(top) if top.message == record.message => {}
            _ => return Err(SnapError::ShelfMissing(record.message)),
        }

        refresh_ids(&mut catalog, &shelves);
        insert_newest(&mut catalog, record.clone());
        let evicted = match origin {
            Origin::Auto => evict_auto(&mut catalog, self.config.max_auto_snapshots),
            Origin::Manual => Vec::new(),
        };
        self.store.write(&catalog)?;
        tracing::info!(key = ?record.key, origin = %origin, "snapshot created");

        if !evicted.is_empty() {
            self.drop_evicted(&evicted, &mut catalog);
        }

        if self.config.keep_working_tree {
            // The new shelf is still at index 0; evictions only removed older entries.
            self.vcs.apply(0)?;
        }
        Ok(CreateOutcome::Created(record))
    }

    /// Best effort: an eviction that cannot drop its shelf leaves it on the stash list.
    fn drop_evicted(&self, evicted: &[SnapshotRecord], catalog: &mut [SnapshotRecord]) {
        for record in evicted {
            let dropped = self.vcs.list_shelves().and_then(|shelves| {
                match live_index(record, &shelves) {
                    Some(index) => self.vcs.drop_shelf(index).map(|()| true),
                    None => Ok(false),
                }
            });
            match dropped {
                Ok(true) => tracing::info!(key = ?record.key, "evicted automatic snapshot"),
                Ok(false) => tracing::debug!(key = ?record.key, "evicted snapshot had no shelf entry"),
                Err(e) => tracing::warn!(key = ?record.key, error = %e, "failed to drop evicted shelf"),
            }
        }
        match self.vcs.list_shelves() {
            Ok(shelves) => {
                if refresh_ids(catalog, &shelves) {
                    if let Err(e) = self.store.write(catalog) {
                        tracing::warn!(error = %e, "failed to persist ids after eviction");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to refresh ids after eviction"),
        }
    }

    // -----------------------------------------------------------------------
    // List
    // -----------------------------------------------------------------------

    /// Catalog newest-first with ids refreshed to live shelf positions.
    ///
    /// Outside a repository the stored catalog is returned unchanged.
    pub fn list(&self) -> Result<Vec<SnapshotView>> {
        if !self.vcs.is_repo() {
            return Ok(self
                .store
                .read()
                .into_iter()
                .map(|record| SnapshotView {
                    record,
                    orphaned: false,
                })
                .collect());
        }

        let _lock = self.store.lock()?;
        let mut catalog = self.store.read();
        let shelves = self.vcs.list_shelves()?;
        if refresh_ids(&mut catalog, &shelves) {
            self.store.write(&catalog)?;
        }
        Ok(catalog
            .into_iter()
            .map(|record| {
                let orphaned = live_index(&record, &shelves).is_none();
                SnapshotView { record, orphaned }
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Restore / rollback / delete / prune
    // -----------------------------------------------------------------------

    /// Apply a snapshot, keeping it on the shelf and in the catalog.
    pub fn restore(&self, target: &str) -> Result<SnapshotRecord> {
        self.require_repo()?;
        let _lock = self.store.lock()?;
        let catalog = self.store.read();
        let shelves = self.vcs.list_shelves()?;
        let (pos, index) = resolve(&catalog, &shelves, target)?;
        self.vcs.apply(index)?;
        tracing::info!(key = ?catalog[pos].key, index, "snapshot restored");
        Ok(catalog[pos].clone())
    }

    /// Apply a snapshot and remove it from the shelf and the catalog.
    pub fn rollback(&self, target: &str) -> Result<SnapshotRecord> {
        self.remove_with(target, "rolled back", |vcs, index| vcs.pop(index))
    }

    /// Discard a snapshot without applying it.
    pub fn delete(&self, target: &str) -> Result<SnapshotRecord> {
        self.remove_with(target, "deleted", |vcs, index| vcs.drop_shelf(index))
    }

    fn remove_with(
        &self,
        target: &str,
        verb: &str,
        op: impl FnOnce(&V, usize) -> Result<()>,
    ) -> Result<SnapshotRecord> {
        self.require_repo()?;
        let _lock = self.store.lock()?;
        let mut catalog = self.store.read();
        let shelves = self.vcs.list_shelves()?;
        let (pos, index) = resolve(&catalog, &shelves, target)?;

        op(&self.vcs, index)?;
        let removed = catalog.remove(pos);

        let shelves = self.vcs.list_shelves()?;
        refresh_ids(&mut catalog, &shelves);
        self.store.write(&catalog)?;
        tracing::info!(key = ?removed.key, index, "snapshot {verb}");
        Ok(removed)
    }

    /// Drop catalog records whose shelf entry no longer exists.
    pub fn prune(&self) -> Result<Vec<SnapshotRecord>> {
        self.require_repo()?;
        let _lock = self.store.lock()?;
        let catalog = self.store.read();
        let shelves = self.vcs.list_shelves()?;
        let (mut kept, orphans): (Vec<_>, Vec<_>) = catalog
            .into_iter()
            .partition(|r| live_index(r, &shelves).is_some());
        if !orphans.is_empty() {
            refresh_ids(&mut kept, &shelves);
            self.store.write(&kept)?;
            tracing::info!(count = orphans.len(), "pruned orphaned snapshots");
        }
        Ok(orphans)
    }

    fn require_repo(&self) -> Result<()> {
        if self.vcs.is_repo() {
            Ok(())
        } else {
            Err(SnapError::NotAVcsRepo)
        }
    }
}

// ---------------------------------------------------------------------------
// Stable id resolution
// ---------------------------------------------------------------------------

/// Current shelf position of `record`, matched by its message.
pub fn live_index(record: &SnapshotRecord, shelves: &[ShelfEntry]) -> Option<usize> {
    shelves
        .iter()
        .find(|e| e.message == record.message)
        .map(|e| e.index)
}

/// Rewrite every locatable record's `id` to its live position.
/// Orphaned records keep their last known id. Returns whether anything changed.
pub fn refresh_ids(catalog: &mut [SnapshotRecord], shelves: &[ShelfEntry]) -> bool {
    let mut changed = false;
    for record in catalog.iter_mut() {
        if let Some(index) = live_index(record, shelves) {
            let id = index.to_string();
            if record.id != id {
                record.id = id;
                changed = true;
            }
        }
    }
    changed
}

/// Resolve `target` to `(catalog position, live shelf index)`.
///
/// A target of digits shorter than a key is a live shelf position as shown
/// by `list`. Anything else is a key prefix.
pub fn resolve(
    catalog: &[SnapshotRecord],
    shelves: &[ShelfEntry],
    target: &str,
) -> Result<(usize, usize)> {
    let target = target.trim();
    let pos = match positional(target) {
        Some(n) => catalog
            .iter()
            .position(|r| live_index(r, shelves) == Some(n))
            .ok_or_else(|| SnapError::SnapshotNotFound(target.to_string()))?,
        None => {
            let matches: Vec<usize> = catalog
                .iter()
                .enumerate()
                .filter(|(_, r)| r.key_matches(target))
                .map(|(i, _)| i)
                .collect();
            match matches.as_slice() {
                [pos] => *pos,
                [] => return Err(SnapError::SnapshotNotFound(target.to_string())),
                _ => return Err(SnapError::AmbiguousTarget(target.to_string())),
            }
        }
    };

    let index = live_index(&catalog[pos], shelves).ok_or_else(|| {
        SnapError::SnapshotNotFound(format!(
            "{target} (shelf entry was removed outside snapguard; run `snapguard prune`)"
        ))
    })?;
    Ok((pos, index))
}

fn positional(target: &str) -> Option<usize> {
    if target.is_empty()
        || target.len() >= KEY_LEN
        || !target.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    target.parse().ok()
}

/// `now` at millisecond precision, nudged forward so a new record sorts strictly ahead of `newest`.
fn strictly_after(now: DateTime<Utc>, newest: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(3);
    match newest {
        Some(newest) if now <= newest => newest + Duration::milliseconds(1),
        _ => now,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
