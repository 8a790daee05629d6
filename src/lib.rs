pub mod cache;
pub mod commit;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod history;
pub mod model;
pub mod platform;
pub mod progress;
pub mod reconcile;
pub mod scanner;
pub mod storage;

pub use cache::TrackerState;
pub use commit::{CommitCoordinator, CommitOutcome, CommitPolicy, PendingChanges};
pub use config::AppConfig;
pub use engine::{ScanEngine, ScanResult};
pub use error::{Error, Result};
pub use model::{ContentRecord, IdentityKey, InstanceRecord, ObservedFile, ScanMetadata};
pub use progress::{ProgressReporter, SilentReporter};
pub use reconcile::{Changes, Outcome, Reconciler};
pub use scanner::ScanStats;
