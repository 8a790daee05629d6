/// Trait for reporting scan progress.
///
/// The binary implements it with indicatif; library callers can use [`SilentReporter`].
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _roots: &[String]) {}
    fn on_file_processed(&self, _files_seen: usize, _current_path: &str) {}
    fn on_commit(&self, _rows: usize) {}
    fn on_commit_failed(&self, _error: &str) {}
    fn on_scan_complete(&self, _files_seen: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
