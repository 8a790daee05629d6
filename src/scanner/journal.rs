use crate::error::Result;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Append-only text log of files that failed to process, one line per failure.
#[derive(Debug, Default)]
pub struct ErrorJournal {
    file: Option<Mutex<File>>,
}

impl ErrorJournal {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn open(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::disabled());
        };
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn record(&self, path: &Path, error: &dyn std::fmt::Display) {
        let Some(file) = &self.file else {
            return;
        };
        let line = format!(
            "{}\t{}\t{}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            path.display(),
            error
        );
        let mut file = match file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = file.write_all(line.as_bytes()) {
            warn!("Could not write to error journal: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs/scan-errors.txt");
        let log_str = log.to_string_lossy().into_owned();

        let journal = ErrorJournal::open(Some(&log_str)).unwrap();
        assert!(journal.is_enabled());
        journal.record(Path::new("/a/locked.bin"), &"permission denied");
        drop(journal);

        let journal = ErrorJournal::open(Some(&log_str)).unwrap();
        journal.record(Path::new("/a/gone.bin"), &"not found");

        let contents = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("/a/locked.bin\tpermission denied"));
        assert!(lines[1].contains("/a/gone.bin"));
    }

    #[test]
    fn test_disabled_journal_is_noop() {
        let journal = ErrorJournal::open(None).unwrap();
        assert!(!journal.is_enabled());
        journal.record(Path::new("/x"), &"ignored");
    }
}
