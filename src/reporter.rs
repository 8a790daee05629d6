use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use past_files::ProgressReporter;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Spinner on stderr while a scan runs.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar().take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, roots: &[String]) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message(format!("Scanning {} roots...", roots.len()));
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.bar();
        if let Some(old) = guard.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn on_file_processed(&self, files_seen: usize, current_path: &str) {
        if files_seen % 64 != 0 {
            return;
        }
        if let Some(pb) = self.bar().as_ref() {
            pb.set_message(format!("{} files: {}", files_seen, current_path));
        }
    }

    fn on_commit(&self, rows: usize) {
        if let Some(pb) = self.bar().as_ref() {
            pb.println(format!("  {} Committed {} rows", "✓".green(), rows));
        }
    }

    fn on_commit_failed(&self, error: &str) {
        if let Some(pb) = self.bar().as_ref() {
            pb.println(format!("  {} Commit failed: {}", "✗".red(), error));
        }
    }

    fn on_scan_complete(&self, files_seen: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Scan complete: {} files in {:.2}s",
            "✓".green(),
            files_seen,
            duration_secs
        );
    }
}
