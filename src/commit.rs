//! Batched, lock-guarded persistence of in-memory changes.
//!
//! Scan workers mutate the caches directly and stage the keys of what they
//! touched in [`PendingChanges`]. A flush drains the staged keys, builds rows
//! from the current cache contents, and writes them in one transaction while
//! holding the commit lock (the mutex owning the [`Database`]). A failed flush
//! puts the drained keys back so the next flush retries them.

use crate::cache::TrackerState;
use crate::config::AppConfig;
use crate::error::Result;
use crate::model::IdentityKey;
use crate::storage::models::{ContentRow, InstanceRow, LocationHistoryRow, NameHistoryRow};
use crate::storage::{CommitBatch, Database};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keys and history rows one file's processing produced.
#[derive(Debug, Default)]
pub struct Staged {
    pub contents: Vec<String>,
    pub instance: Option<IdentityKey>,
    pub locations: Vec<LocationHistoryRow>,
    pub names: Vec<NameHistoryRow>,
}

impl Staged {
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
            && self.instance.is_none()
            && self.locations.is_empty()
            && self.names.is_empty()
    }
}

#[derive(Debug, Default)]
struct PendingSet {
    contents: HashSet<String>,
    instances: HashSet<IdentityKey>,
    locations: Vec<LocationHistoryRow>,
    names: Vec<NameHistoryRow>,
}

impl PendingSet {
    fn is_empty(&self) -> bool {
        self.contents.is_empty()
            && self.instances.is_empty()
            && self.locations.is_empty()
            && self.names.is_empty()
    }

    /// Put an older, undelivered set back in front of whatever was staged since.
    fn merge_older(&mut self, older: PendingSet) {
        self.contents.extend(older.contents);
        self.instances.extend(older.instances);
        let newer_locations = std::mem::replace(&mut self.locations, older.locations);
        self.locations.extend(newer_locations);
        let newer_names = std::mem::replace(&mut self.names, older.names);
        self.names.extend(newer_names);
    }
}

/// Snapshot of how much is waiting for the next flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub contents: usize,
    pub instances: usize,
    pub locations: usize,
    pub names: usize,
}

impl PendingCounts {
    pub fn is_empty(&self) -> bool {
        *self == PendingCounts::default()
    }
}

/// Dirty set shared by all workers. Its mutex is held only while staging or
/// draining, never across a store write.
#[derive(Debug, Default)]
pub struct PendingChanges {
    inner: Mutex<PendingSet>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage one file's bookkeeping as a unit.
    pub fn stage(&self, staged: Staged) {
        if staged.is_empty() {
            return;
        }
        let mut pending = lock(&self.inner);
        pending.contents.extend(staged.contents);
        if let Some(key) = staged.instance {
            pending.instances.insert(key);
        }
        pending.locations.extend(staged.locations);
        pending.names.extend(staged.names);
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }

    pub fn counts(&self) -> PendingCounts {
        let pending = lock(&self.inner);
        PendingCounts {
            contents: pending.contents.len(),
            instances: pending.instances.len(),
            locations: pending.locations.len(),
            names: pending.names.len(),
        }
    }

    fn take(&self) -> PendingSet {
        std::mem::take(&mut *lock(&self.inner))
    }

    fn restore(&self, older: PendingSet) {
        lock(&self.inner).merge_older(older);
    }
}

/// When the scan loop should flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    pub interval: Duration,
    pub every_files: Option<usize>,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(500),
            every_files: None,
        }
    }
}

impl CommitPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.commit_interval_secs),
            every_files: config.commit_every_files.filter(|n| *n > 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    NothingPending,
    Committed { rows: usize },
    /// The write failed; the staged changes are pending again.
    Failed(String),
}

pub struct CommitCoordinator {
    store: Mutex<Database>,
    pending: PendingChanges,
    policy: CommitPolicy,
    last_commit: Mutex<Instant>,
    files_since_commit: AtomicUsize,
    commits: AtomicUsize,
    failed_commits: AtomicUsize,
}

impl CommitCoordinator {
    pub fn new(db: Database, policy: CommitPolicy) -> Self {
        Self {
            store: Mutex::new(db),
            pending: PendingChanges::new(),
            policy,
            last_commit: Mutex::new(Instant::now()),
            files_since_commit: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            failed_commits: AtomicUsize::new(0),
        }
    }

    pub fn pending(&self) -> &PendingChanges {
        &self.pending
    }

    pub fn note_file_processed(&self) {
        self.files_since_commit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_due(&self) -> bool {
        if let Some(every) = self.policy.every_files {
            if self.files_since_commit.load(Ordering::Relaxed) >= every {
                return true;
            }
        }
        lock(&self.last_commit).elapsed() >= self.policy.interval
    }

    /// Flush if the time or count trigger has fired.
    pub fn commit_if_due(&self, state: &TrackerState) -> Option<CommitOutcome> {
        if self.is_due() {
            Some(self.maybe_commit(state))
        } else {
            None
        }
    }

    /// Flush everything pending under the commit lock. A no-op when nothing is pending.
    pub fn maybe_commit(&self, state: &TrackerState) -> CommitOutcome {
        let mut db = lock(&self.store);
        let drained = self.pending.take();
        *lock(&self.last_commit) = Instant::now();
        self.files_since_commit.store(0, Ordering::Relaxed);

        if drained.is_empty() {
            debug!("No pending changes to commit");
            return CommitOutcome::NothingPending;
        }

        let batch = build_batch(&drained, state);
        match db.write_batch(&batch) {
            Ok(rows) => {
                self.commits.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Committed {} rows ({} contents, {} instances, {} history entries) at {}",
                    rows,
                    batch.contents.len(),
                    batch.instances.len(),
                    batch.locations.len() + batch.names.len(),
                    Utc::now().format("%Y-%m-%d %H:%M:%S")
                );
                CommitOutcome::Committed { rows }
            }
            Err(err) => {
                let detail = error_chain(&err);
                error!(
                    "Failed to commit {} pending rows, will retry at next commit: {}",
                    batch.row_count(),
                    detail
                );
                self.pending.restore(drained);
                self.failed_commits.fetch_add(1, Ordering::Relaxed);
                CommitOutcome::Failed(detail)
            }
        }
    }

    /// Scan start bookkeeping, written immediately rather than batched.
    pub fn record_scan_start(&self, started_at: DateTime<Utc>) -> Result<()> {
        lock(&self.store).record_scan_start(started_at)
    }

    pub fn record_scan_completed(&self) -> Result<()> {
        lock(&self.store).record_scan_completed()
    }

    /// Run `f` against the store while holding the commit lock.
    pub fn with_database<R>(&self, f: impl FnOnce(&mut Database) -> R) -> R {
        f(&mut lock(&self.store))
    }

    pub fn into_database(self) -> Database {
        self.store.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn failed_commit_count(&self) -> usize {
        self.failed_commits.load(Ordering::Relaxed)
    }
}

/// Rows for a drained set, read from the caches as they are now.
///
/// Every dirty instance also brings its current content row, so the instance's
/// foreign key is satisfied even if that content was staged by another worker
/// that has not reached the pending set yet.
fn build_batch(pending: &PendingSet, state: &TrackerState) -> CommitBatch {
    let mut content_hashes: BTreeSet<String> = pending.contents.iter().cloned().collect();

    let mut instances: Vec<InstanceRow> = pending
        .instances
        .iter()
        .filter_map(|key| state.instances.find(key))
        .map(|record| {
            if let Some(hash) = state.contents.hash_of(record.content_id) {
                content_hashes.insert(hash);
            }
            InstanceRow::from(&record)
        })
        .collect();
    instances.sort_by_key(|row| row.id);

    let mut contents: Vec<ContentRow> = content_hashes
        .iter()
        .filter_map(|hash| state.contents.get(hash))
        .map(|record| ContentRow::from(&record))
        .collect();
    contents.sort_by_key(|row| row.id);

    CommitBatch {
        contents,
        instances,
        locations: pending.locations.clone(),
        names: pending.names.clone(),
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(" Inner: ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
