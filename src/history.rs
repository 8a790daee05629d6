//! Append-only location and name history.
//!
//! Every append also returns the row to persist, so callers can stage it with the
//! rest of the file's bookkeeping.

use crate::model::{HistoryId, InstanceRecord, LocationHistoryEntry, NameHistoryEntry};
use crate::storage::models::{LocationHistoryRow, NameHistoryRow};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

pub struct HistoryTracker {
    next_location_id: AtomicI64,
    next_name_id: AtomicI64,
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl HistoryTracker {
    pub fn new(next_location_id: HistoryId, next_name_id: HistoryId) -> Self {
        Self {
            next_location_id: AtomicI64::new(next_location_id),
            next_name_id: AtomicI64::new(next_name_id),
        }
    }

    /// Append a location entry and return its row.
    ///
    /// `noticed_at` is clamped to the latest existing entry so history stays
    /// non-decreasing even if the clock steps backwards.
    pub fn record_location(
        &self,
        instance: &mut InstanceRecord,
        directory_path: &str,
        noticed_at: DateTime<Utc>,
    ) -> LocationHistoryRow {
        let noticed_at = match instance.latest_location() {
            Some(latest) => noticed_at.max(latest.change_noticed_time),
            None => noticed_at,
        };
        let entry = LocationHistoryEntry {
            id: self.next_location_id.fetch_add(1, Ordering::SeqCst),
            directory_path: directory_path.to_string(),
            change_noticed_time: noticed_at,
        };
        let row = LocationHistoryRow::new(instance.id, &entry);
        instance.location_history.push(entry);
        row
    }

    /// Append a name entry and return its row. Same clamping as locations.
    pub fn record_name(
        &self,
        instance: &mut InstanceRecord,
        file_name: &str,
        noticed_at: DateTime<Utc>,
    ) -> NameHistoryRow {
        let noticed_at = match instance.latest_name() {
            Some(latest) => noticed_at.max(latest.change_noticed_time),
            None => noticed_at,
        };
        let entry = NameHistoryEntry {
            id: self.next_name_id.fetch_add(1, Ordering::SeqCst),
            file_name: file_name.to_string(),
            change_noticed_time: noticed_at,
        };
        let row = NameHistoryRow::new(instance.id, &entry);
        instance.name_history.push(entry);
        row
    }

    /// Move an instance to `path` and append whatever history the move implies.
    ///
    /// A name entry is appended when the file name differs from
    /// `current_file_name`; a location entry when `directory` differs from the
    /// latest recorded location. Does nothing if the path is unchanged.
    pub fn apply_path_change(
        &self,
        instance: &mut InstanceRecord,
        path: &str,
        directory: &str,
        file_name: &str,
        noticed_at: DateTime<Utc>,
    ) -> PathChange {
        let mut change = PathChange::default();
        if instance.current_path == path {
            return change;
        }
        instance.current_path = path.to_string();
        change.path_changed = true;

        if instance.current_file_name != file_name {
            instance.current_file_name = file_name.to_string();
            change.name = Some(self.record_name(instance, file_name, noticed_at));
        }

        let moved = instance
            .latest_location()
            .map_or(true, |latest| latest.directory_path != directory);
        if moved {
            change.location = Some(self.record_location(instance, directory, noticed_at));
        }
        change
    }
}

/// History produced by [`HistoryTracker::apply_path_change`].
#[derive(Debug, Default)]
pub struct PathChange {
    pub path_changed: bool,
    pub name: Option<NameHistoryRow>,
    pub location: Option<LocationHistoryRow>,
}

impl PathChange {
    pub fn renamed(&self) -> bool {
        self.name.is_some()
    }

    pub fn moved(&self) -> bool {
        self.location.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IdentityKey;
    use chrono::Duration;

    fn seeded_instance(tracker: &HistoryTracker, at: DateTime<Utc>) -> InstanceRecord {
        let mut instance = InstanceRecord {
            id: 7,
            key: IdentityKey::new(1, 1),
            content_id: 1,
            current_path: "/a/b.txt".to_string(),
            current_file_name: "b.txt".to_string(),
            last_write_time: at,
            first_seen_instance: at,
            last_seen_instance: at,
            location_history: Vec::new(),
            name_history: Vec::new(),
        };
        tracker.record_name(&mut instance, "b.txt", at);
        tracker.record_location(&mut instance, "/a", at);
        instance
    }

    #[test]
    fn test_rename_appends_name_only() {
        let tracker = HistoryTracker::default();
        let t0 = Utc::now();
        let mut instance = seeded_instance(&tracker, t0);

        let change =
            tracker.apply_path_change(&mut instance, "/a/c.txt", "/a", "c.txt", t0 + Duration::seconds(1));
        assert!(change.renamed());
        assert!(!change.moved());
        assert_eq!(instance.current_file_name, "c.txt");
        assert_eq!(instance.name_history.len(), 2);
        assert_eq!(instance.location_history.len(), 1);
        assert_eq!(change.name.unwrap().instance_id, 7);
    }

    #[test]
    fn test_move_appends_location_only() {
        let tracker = HistoryTracker::default();
        let t0 = Utc::now();
        let mut instance = seeded_instance(&tracker, t0);

        let change = tracker.apply_path_change(&mut instance, "/z/b.txt", "/z", "b.txt", t0);
        assert!(change.moved());
        assert!(!change.renamed());
        assert_eq!(instance.latest_location().unwrap().directory_path, "/z");
        assert_eq!(instance.current_directory(), "/z");
    }

    #[test]
    fn test_unchanged_path_is_noop() {
        let tracker = HistoryTracker::default();
        let t0 = Utc::now();
        let mut instance = seeded_instance(&tracker, t0);

        let change = tracker.apply_path_change(&mut instance, "/a/b.txt", "/a", "b.txt", t0);
        assert!(!change.path_changed);
        assert_eq!(instance.name_history.len(), 1);
        assert_eq!(instance.location_history.len(), 1);
    }

    #[test]
    fn test_backwards_clock_is_clamped() {
        let tracker = HistoryTracker::default();
        let t0 = Utc::now();
        let mut instance = seeded_instance(&tracker, t0);

        let row = tracker.record_location(&mut instance, "/old", t0 - Duration::hours(1));
        assert_eq!(row.change_noticed_time, t0.naive_utc());
        let times: Vec<_> = instance
            .location_history
            .iter()
            .map(|e| e.change_noticed_time)
            .collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_ids_are_sequential() {
        let tracker = HistoryTracker::new(10, 20);
        let t0 = Utc::now();
        let instance = seeded_instance(&tracker, t0);
        assert_eq!(instance.name_history[0].id, 20);
        assert_eq!(instance.location_history[0].id, 10);
    }
}
