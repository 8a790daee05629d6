pub mod content;
pub mod instance;

pub use content::{ContentCache, ContentLookup};
pub use instance::InstanceCache;

use crate::error::Result;
use crate::history::HistoryTracker;
use crate::model::{ContentRecord, InstanceId, LocationHistoryEntry, NameHistoryEntry};
use crate::storage::Database;
use std::collections::HashMap;
use tracing::info;

/// The in-memory state shared by every scan worker.
///
/// Loaded once from the store at startup and mutated in place afterwards; it is
/// never reloaded mid-run.
#[derive(Default)]
pub struct TrackerState {
    pub contents: ContentCache,
    pub instances: InstanceCache,
    pub history: HistoryTracker,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(db: &mut Database) -> Result<Self> {
        info!("Loading database into memory...");

        let contents = ContentCache::from_records(
            db.load_contents()?.into_iter().map(ContentRecord::from),
        );
        info!("Loaded {} contents into cache", contents.len());

        let mut max_location_id = 0;
        let mut locations: HashMap<InstanceId, Vec<LocationHistoryEntry>> = HashMap::new();
        for row in db.load_location_history()? {
            max_location_id = max_location_id.max(row.id);
            locations
                .entry(row.instance_id)
                .or_default()
                .push(LocationHistoryEntry::from(row));
        }

        let mut max_name_id = 0;
        let mut names: HashMap<InstanceId, Vec<NameHistoryEntry>> = HashMap::new();
        for row in db.load_name_history()? {
            max_name_id = max_name_id.max(row.id);
            names
                .entry(row.instance_id)
                .or_default()
                .push(NameHistoryEntry::from(row));
        }

        let instances = InstanceCache::from_records(db.load_instances()?.into_iter().map(|row| {
            let id = row.id;
            row.into_record(
                locations.remove(&id).unwrap_or_default(),
                names.remove(&id).unwrap_or_default(),
            )
        }));
        info!("Loaded {} instances into cache", instances.len());

        Ok(Self {
            contents,
            instances,
            history: HistoryTracker::new(max_location_id + 1, max_name_id + 1),
        })
    }
}
