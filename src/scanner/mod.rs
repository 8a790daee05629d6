pub mod journal;
pub mod walk;

pub use journal::ErrorJournal;
pub use walk::{enumerate_paths, plan_scan_units, IgnoreSet, ScanUnit};

use crate::cache::TrackerState;
use crate::commit::{CommitCoordinator, CommitOutcome};
use crate::progress::ProgressReporter;
use crate::reconcile::{Outcome, Reconciler};
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, warn};

/// Per-file tallies for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_seen: usize,
    pub created: usize,
    /// New instances whose content was already known.
    pub duplicates: usize,
    pub updated: usize,
    pub renamed: usize,
    pub moved: usize,
    pub content_changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub anomalies: usize,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    files_seen: AtomicUsize,
    created: AtomicUsize,
    duplicates: AtomicUsize,
    updated: AtomicUsize,
    renamed: AtomicUsize,
    moved: AtomicUsize,
    content_changed: AtomicUsize,
    unchanged: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    anomalies: AtomicUsize,
}

fn bump(counter: &AtomicUsize) -> usize {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl StatsCollector {
    fn record(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Created { content_reused, .. } => {
                bump(&self.created);
                if *content_reused {
                    bump(&self.duplicates);
                }
            }
            Outcome::Updated { changes, .. } => {
                bump(&self.updated);
                if changes.renamed {
                    bump(&self.renamed);
                }
                if changes.moved {
                    bump(&self.moved);
                }
                if changes.content_changed {
                    bump(&self.content_changed);
                }
            }
            Outcome::Unchanged { .. } => {
                bump(&self.unchanged);
            }
        }
        if outcome.is_anomaly() {
            bump(&self.anomalies);
        }
    }

    pub(crate) fn snapshot(&self) -> ScanStats {
        let get = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        ScanStats {
            files_seen: get(&self.files_seen),
            created: get(&self.created),
            duplicates: get(&self.duplicates),
            updated: get(&self.updated),
            renamed: get(&self.renamed),
            moved: get(&self.moved),
            content_changed: get(&self.content_changed),
            unchanged: get(&self.unchanged),
            skipped: get(&self.skipped),
            failed: get(&self.failed),
            anomalies: get(&self.anomalies),
        }
    }
}

/// Everything a worker needs to scan units. Shared by reference across rayon workers.
pub struct ScanWorker<'a> {
    pub(crate) reconciler: Reconciler<'a>,
    pub(crate) state: &'a TrackerState,
    pub(crate) coordinator: &'a CommitCoordinator,
    pub(crate) ignore: &'a IgnoreSet,
    pub(crate) journal: &'a ErrorJournal,
    pub(crate) stats: &'a StatsCollector,
    pub(crate) reporter: &'a dyn ProgressReporter,
}

impl<'a> ScanWorker<'a> {
    pub fn scan_unit(&self, unit: &ScanUnit) {
        debug!("Scanning {}", unit);
        for path in unit.walk(self.ignore) {
            self.process_file(&path);
        }
    }

    /// Reconcile one file, then give the commit policy a chance to flush.
    /// Per-file errors are logged and counted; they never stop the worker.
    pub fn process_file(&self, path: &Path) {
        match self.reconciler.process_path(path, Utc::now()) {
            Ok(outcome) => self.stats.record(&outcome),
            Err(err) if err.is_skip() => {
                warn!(path = %path.display(), "Skipping file: {}", err);
                bump(&self.stats.skipped);
            }
            Err(err) => {
                error!(path = %path.display(), "Failed to process file: {}", err);
                bump(&self.stats.failed);
                self.journal.record(path, &err);
            }
        }

        let seen = bump(&self.stats.files_seen);
        self.reporter
            .on_file_processed(seen, &path.to_string_lossy());

        self.coordinator.note_file_processed();
        if let Some(outcome) = self.coordinator.commit_if_due(self.state) {
            report_commit(self.reporter, &outcome);
        }
    }
}

pub(crate) fn report_commit(reporter: &dyn ProgressReporter, outcome: &CommitOutcome) {
    match outcome {
        CommitOutcome::Committed { rows } => reporter.on_commit(*rows),
        CommitOutcome::Failed(detail) => reporter.on_commit_failed(detail),
        CommitOutcome::NothingPending => {}
    }
}
