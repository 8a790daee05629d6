use super::schema;
use crate::model::{
    ContentRecord, IdentityKey, InstanceId, InstanceRecord, LocationHistoryEntry,
    NameHistoryEntry, ScanMetadata,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;

pub(crate) fn to_naive(time: DateTime<Utc>) -> NaiveDateTime {
    time.naive_utc()
}

pub(crate) fn from_naive(time: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(time, Utc)
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::contents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ContentRow {
    pub id: i64,
    pub hash: String,
    pub size: i64,
    pub first_seen_global: NaiveDateTime,
    pub last_seen_global: NaiveDateTime,
}

impl From<&ContentRecord> for ContentRow {
    fn from(record: &ContentRecord) -> Self {
        ContentRow {
            id: record.id,
            hash: record.hash.clone(),
            size: record.size as i64,
            first_seen_global: to_naive(record.first_seen_global),
            last_seen_global: to_naive(record.last_seen_global),
        }
    }
}

impl From<ContentRow> for ContentRecord {
    fn from(row: ContentRow) -> Self {
        ContentRecord {
            id: row.id,
            hash: row.hash,
            size: row.size as u64,
            first_seen_global: from_naive(row.first_seen_global),
            last_seen_global: from_naive(row.last_seen_global),
        }
    }
}

/// An instance row. History lives in its own tables.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::instances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InstanceRow {
    pub id: i64,
    pub content_id: i64,
    pub volume_serial: i64,
    pub file_id: i64,
    pub current_path: String,
    pub current_file_name: String,
    pub last_write_time: NaiveDateTime,
    pub first_seen_instance: NaiveDateTime,
    pub last_seen_instance: NaiveDateTime,
}

impl InstanceRow {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(self.file_id as u64, self.volume_serial as u64)
    }

    pub fn into_record(
        self,
        location_history: Vec<LocationHistoryEntry>,
        name_history: Vec<NameHistoryEntry>,
    ) -> InstanceRecord {
        InstanceRecord {
            id: self.id,
            key: self.identity_key(),
            content_id: self.content_id,
            current_path: self.current_path,
            current_file_name: self.current_file_name,
            last_write_time: from_naive(self.last_write_time),
            first_seen_instance: from_naive(self.first_seen_instance),
            last_seen_instance: from_naive(self.last_seen_instance),
            location_history,
            name_history,
        }
    }
}

impl From<&InstanceRecord> for InstanceRow {
    fn from(record: &InstanceRecord) -> Self {
        InstanceRow {
            id: record.id,
            content_id: record.content_id,
            volume_serial: record.key.volume_serial as i64,
            file_id: record.key.file_id as i64,
            current_path: record.current_path.clone(),
            current_file_name: record.current_file_name.clone(),
            last_write_time: to_naive(record.last_write_time),
            first_seen_instance: to_naive(record.first_seen_instance),
            last_seen_instance: to_naive(record.last_seen_instance),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::location_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LocationHistoryRow {
    pub id: i64,
    pub instance_id: i64,
    pub directory_path: String,
    pub change_noticed_time: NaiveDateTime,
}

impl LocationHistoryRow {
    pub fn new(instance_id: InstanceId, entry: &LocationHistoryEntry) -> Self {
        LocationHistoryRow {
            id: entry.id,
            instance_id,
            directory_path: entry.directory_path.clone(),
            change_noticed_time: to_naive(entry.change_noticed_time),
        }
    }
}

impl From<LocationHistoryRow> for LocationHistoryEntry {
    fn from(row: LocationHistoryRow) -> Self {
        LocationHistoryEntry {
            id: row.id,
            directory_path: row.directory_path,
            change_noticed_time: from_naive(row.change_noticed_time),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::name_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NameHistoryRow {
    pub id: i64,
    pub instance_id: i64,
    pub file_name: String,
    pub change_noticed_time: NaiveDateTime,
}

impl NameHistoryRow {
    pub fn new(instance_id: InstanceId, entry: &NameHistoryEntry) -> Self {
        NameHistoryRow {
            id: entry.id,
            instance_id,
            file_name: entry.file_name.clone(),
            change_noticed_time: to_naive(entry.change_noticed_time),
        }
    }
}

impl From<NameHistoryRow> for NameHistoryEntry {
    fn from(row: NameHistoryRow) -> Self {
        NameHistoryEntry {
            id: row.id,
            file_name: row.file_name,
            change_noticed_time: from_naive(row.change_noticed_time),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = schema::scan_metadata)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScanMetadataRow {
    pub id: i32,
    pub last_scan_start_time: Option<NaiveDateTime>,
    pub last_scan_completed: bool,
}

impl From<ScanMetadataRow> for ScanMetadata {
    fn from(row: ScanMetadataRow) -> Self {
        ScanMetadata {
            last_scan_start_time: row.last_scan_start_time.map(from_naive),
            last_scan_completed: row.last_scan_completed,
        }
    }
}

/// Row counts across the tracking tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub contents: i64,
    pub instances: i64,
    pub location_entries: i64,
    pub name_entries: i64,
}

/// Everything one flush writes, in foreign-key order.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    pub contents: Vec<ContentRow>,
    pub instances: Vec<InstanceRow>,
    pub locations: Vec<LocationHistoryRow>,
    pub names: Vec<NameHistoryRow>,
}

impl CommitBatch {
    pub fn row_count(&self) -> usize {
        self.contents.len() + self.instances.len() + self.locations.len() + self.names.len()
    }
}
