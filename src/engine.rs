use crate::cache::TrackerState;
use crate::commit::{CommitCoordinator, CommitOutcome, CommitPolicy};
use crate::config::{self, AppConfig};
use crate::error::Result;
use crate::hasher::{Blake3Hasher, ContentHasher};
use crate::platform::{self, IdentityProvider};
use crate::progress::{ProgressReporter, SilentReporter};
use crate::reconcile::Reconciler;
use crate::scanner::{self, ErrorJournal, IgnoreSet, ScanStats, ScanWorker, StatsCollector};
use crate::storage::Database;
use chrono::Utc;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::{error, info};

pub struct ScanEngine {
    config: AppConfig,
    db_path: String,
    identity: Box<dyn IdentityProvider>,
    hasher: Box<dyn ContentHasher>,
}

#[derive(Debug)]
pub struct ScanResult {
    pub roots: Vec<String>,
    pub units: usize,
    pub stats: ScanStats,
    pub commits: usize,
    pub failed_commits: usize,
    /// False when the final flush failed; the scan is then not marked completed.
    pub completed: bool,
    pub duration: Duration,
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Self {
        let db_path = config.database_path.clone();
        Self {
            config,
            db_path,
            identity: platform::default_identity_provider(),
            hasher: Box::new(Blake3Hasher),
        }
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.db_path = path.to_string();
        self
    }

    pub fn with_identity_provider(mut self, identity: Box<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_hasher(mut self, hasher: Box<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn scan(&self) -> Result<ScanResult> {
        self.scan_with_progress(&SilentReporter)
    }

    /// Run one full scan:
    /// 1. Load the store into the caches and mark the scan as started
    /// 2. Reconcile every file under the roots, flushing on the commit policy
    /// 3. Final flush, then mark the scan as completed
    pub fn scan_with_progress(&self, reporter: &dyn ProgressReporter) -> Result<ScanResult> {
        let started = Instant::now();
        let roots = config::non_overlapping_directories(config::absolute_roots(
            self.config.root_paths.clone(),
        ));
        info!("Processing directories: {:?}", roots);

        let mut db = Database::open(&self.db_path)?;
        let state = TrackerState::load(&mut db)?;
        let coordinator = CommitCoordinator::new(db, CommitPolicy::from_config(&self.config));
        coordinator.record_scan_start(Utc::now())?;

        let journal = ErrorJournal::open(self.config.error_log_path.as_deref())?;
        let ignore = IgnoreSet::new(&self.config.ignore_patterns);
        let units = scanner::plan_scan_units(&roots, &ignore);
        info!("Scanning {} units across {} roots", units.len(), roots.len());
        reporter.on_scan_start(&roots);

        let stats = StatsCollector::default();
        let worker = ScanWorker {
            reconciler: Reconciler::new(
                &state,
                coordinator.pending(),
                self.identity.as_ref(),
                self.hasher.as_ref(),
            ),
            state: &state,
            coordinator: &coordinator,
            ignore: &ignore,
            journal: &journal,
            stats: &stats,
            reporter,
        };

        if self.config.parallel {
            units.par_iter().for_each(|unit| worker.scan_unit(unit));
        } else {
            units.iter().for_each(|unit| worker.scan_unit(unit));
        }

        let final_commit = coordinator.maybe_commit(&state);
        scanner::report_commit(reporter, &final_commit);
        let completed = !matches!(final_commit, CommitOutcome::Failed(_));
        if completed {
            coordinator.record_scan_completed()?;
        } else {
            error!("Final commit failed; scan left marked as incomplete");
        }

        let stats = stats.snapshot();
        let duration = started.elapsed();
        reporter.on_scan_complete(stats.files_seen, duration.as_secs_f64());
        info!(
            "Scan finished in {:.2}s: {} files, {} new, {} updated, {} unchanged, {} skipped, {} failed",
            duration.as_secs_f64(),
            stats.files_seen,
            stats.created,
            stats.updated,
            stats.unchanged,
            stats.skipped,
            stats.failed
        );

        Ok(ScanResult {
            roots,
            units: units.len(),
            stats,
            commits: coordinator.commit_count(),
            failed_commits: coordinator.failed_commit_count(),
            completed,
            duration,
        })
    }
}
