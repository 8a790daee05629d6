use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, MAIN_SEPARATOR};

pub type ContentId = i64;
pub type InstanceId = i64;
pub type HistoryId = i64;

/// Stable OS identity of one physical file: survives renames and moves on the
/// same volume, but not delete + recreate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub file_id: u64,
    pub volume_serial: u64,
}

impl IdentityKey {
    pub fn new(file_id: u64, volume_serial: u64) -> Self {
        Self {
            file_id,
            volume_serial,
        }
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}:{:x}", self.volume_serial, self.file_id)
    }
}

/// A unique byte sequence, identified by its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: ContentId,
    pub hash: String,
    pub size: u64,
    pub first_seen_global: DateTime<Utc>,
    pub last_seen_global: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationHistoryEntry {
    pub id: HistoryId,
    pub directory_path: String,
    pub change_noticed_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameHistoryEntry {
    pub id: HistoryId,
    pub file_name: String,
    pub change_noticed_time: DateTime<Utc>,
}

/// One physical file tracked over its lifetime.
///
/// The instance owns its history by value and points at its current content by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub key: IdentityKey,
    pub content_id: ContentId,
    pub current_path: String,
    pub current_file_name: String,
    pub last_write_time: DateTime<Utc>,
    pub first_seen_instance: DateTime<Utc>,
    pub last_seen_instance: DateTime<Utc>,
    pub location_history: Vec<LocationHistoryEntry>,
    pub name_history: Vec<NameHistoryEntry>,
}

impl InstanceRecord {
    pub fn latest_location(&self) -> Option<&LocationHistoryEntry> {
        self.location_history.last()
    }

    pub fn latest_name(&self) -> Option<&NameHistoryEntry> {
        self.name_history.last()
    }

    /// Directory portion of `current_path`.
    pub fn current_directory(&self) -> String {
        split_normalized(&self.current_path).0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanMetadata {
    pub last_scan_start_time: Option<DateTime<Utc>>,
    pub last_scan_completed: bool,
}

/// What a scan saw for one path, before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFile {
    /// Full path with `/` separators.
    pub path: String,
    pub directory: String,
    pub file_name: String,
    pub size: u64,
    pub last_write_time: DateTime<Utc>,
}

impl ObservedFile {
    pub fn new(path: &Path, size: u64, last_write_time: DateTime<Utc>) -> Self {
        let path = normalize_path(path);
        let (directory, file_name) = split_normalized(&path);
        Self {
            path,
            directory,
            file_name,
            size,
            last_write_time,
        }
    }

    pub fn from_metadata(path: &Path, metadata: &fs::Metadata) -> std::io::Result<Self> {
        let modified = metadata.modified()?;
        Ok(Self::new(path, metadata.len(), DateTime::<Utc>::from(modified)))
    }
}

/// Render a path with `/` as the only separator.
pub fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if MAIN_SEPARATOR == '/' {
        raw.into_owned()
    } else {
        raw.replace(MAIN_SEPARATOR, "/")
    }
}

/// Split a normalized path into (directory, file name).
pub fn split_normalized(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((dir, name)) if dir.ends_with(':') => (format!("{}/", dir), name.to_string()),
        Some((dir, name)) => (dir.to_string(), name.to_string()),
        None => (String::new(), path.to_string()),
    }
}
