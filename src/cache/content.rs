use crate::model::{ContentId, ContentRecord};
use ahash::RandomState;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, warn};

/// Result of [`ContentCache::get_or_create`].
#[derive(Debug, Clone)]
pub struct ContentLookup {
    pub record: ContentRecord,
    /// The hash was new and a record was registered.
    pub created: bool,
    /// An existing record had its `last_seen_global` bumped.
    pub touched: bool,
    /// An existing record carries a different size than the one observed.
    pub size_mismatch: bool,
}

impl ContentLookup {
    pub fn is_dirty(&self) -> bool {
        self.created || self.touched
    }
}

/// In-memory `hash -> ContentRecord` map. Owns dedup decisions.
pub struct ContentCache {
    by_hash: DashMap<String, ContentRecord, RandomState>,
    hash_by_id: DashMap<ContentId, String, RandomState>,
    next_id: AtomicI64,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache {
    pub fn new() -> Self {
        Self {
            by_hash: DashMap::with_hasher(RandomState::new()),
            hash_by_id: DashMap::with_hasher(RandomState::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Bulk-load previously persisted records. Id allocation resumes after the largest id.
    pub fn from_records(records: impl IntoIterator<Item = ContentRecord>) -> Self {
        let cache = Self::new();
        let mut max_id = 0;
        for record in records {
            max_id = max_id.max(record.id);
            cache.hash_by_id.insert(record.id, record.hash.clone());
            cache.by_hash.insert(record.hash.clone(), record);
        }
        cache.next_id.store(max_id + 1, Ordering::SeqCst);
        cache
    }

    /// Return the record for `hash`, registering a new one if the hash is unseen.
    ///
    /// An existing record keeps its size even when `size` disagrees; the mismatch is
    /// logged and flagged on the result.
    pub fn get_or_create(&self, hash: &str, size: u64, observed_at: DateTime<Utc>) -> ContentLookup {
        match self.by_hash.entry(hash.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                let mut touched = false;
                if record.last_seen_global < observed_at {
                    record.last_seen_global = observed_at;
                    touched = true;
                }
                let size_mismatch = record.size != size;
                if size_mismatch {
                    warn!(
                        hash = %record.hash,
                        recorded_size = record.size,
                        observed_size = size,
                        "Hash collision or size mismatch, keeping recorded content size"
                    );
                }
                ContentLookup {
                    record: record.clone(),
                    created: false,
                    touched,
                    size_mismatch,
                }
            }
            Entry::Vacant(vacant) => {
                let record = ContentRecord {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    hash: hash.to_string(),
                    size,
                    first_seen_global: observed_at,
                    last_seen_global: observed_at,
                };
                self.hash_by_id.insert(record.id, record.hash.clone());
                debug!(hash = %record.hash, id = record.id, size, "New content");
                let record = vacant.insert(record).value().clone();
                ContentLookup {
                    record,
                    created: true,
                    touched: false,
                    size_mismatch: false,
                }
            }
        }
    }

    /// Overwrite the size of an existing record. Returns the previous size.
    pub fn update_size(&self, hash: &str, size: u64) -> Option<u64> {
        self.by_hash.get_mut(hash).map(|mut record| {
            let previous = record.size;
            record.size = size;
            previous
        })
    }

    pub fn get(&self, hash: &str) -> Option<ContentRecord> {
        self.by_hash.get(hash).map(|r| r.value().clone())
    }

    pub fn hash_of(&self, id: ContentId) -> Option<String> {
        self.hash_by_id.get(&id).map(|h| h.value().clone())
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_hash_creates_record() {
        let cache = ContentCache::new();
        let now = Utc::now();
        let lookup = cache.get_or_create("h1", 10, now);
        assert!(lookup.created);
        assert_eq!(lookup.record.size, 10);
        assert_eq!(lookup.record.first_seen_global, now);
        assert_eq!(lookup.record.last_seen_global, now);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hash_of(lookup.record.id).as_deref(), Some("h1"));
    }

    #[test]
    fn test_existing_hash_bumps_last_seen_only_forward() {
        let cache = ContentCache::new();
        let t0 = Utc::now();
        let first = cache.get_or_create("h1", 10, t0);

        let later = cache.get_or_create("h1", 10, t0 + Duration::seconds(5));
        assert!(!later.created);
        assert!(later.touched);
        assert_eq!(later.record.id, first.record.id);
        assert_eq!(later.record.last_seen_global, t0 + Duration::seconds(5));
        assert_eq!(later.record.first_seen_global, t0);

        let earlier = cache.get_or_create("h1", 10, t0);
        assert!(!earlier.touched);
        assert!(!earlier.is_dirty());
        assert_eq!(earlier.record.last_seen_global, t0 + Duration::seconds(5));
    }

    #[test]
    fn test_size_mismatch_keeps_recorded_size() {
        let cache = ContentCache::new();
        let now = Utc::now();
        cache.get_or_create("h", 100, now);
        let lookup = cache.get_or_create("h", 200, now);
        assert!(lookup.size_mismatch);
        assert_eq!(lookup.record.size, 100);
        assert_eq!(cache.get("h").unwrap().size, 100);
    }

    #[test]
    fn test_from_records_resumes_ids() {
        let now = Utc::now();
        let cache = ContentCache::from_records(vec![ContentRecord {
            id: 41,
            hash: "old".to_string(),
            size: 1,
            first_seen_global: now,
            last_seen_global: now,
        }]);
        let lookup = cache.get_or_create("new", 2, now);
        assert_eq!(lookup.record.id, 42);
        assert_eq!(cache.hash_of(41).as_deref(), Some("old"));
    }

    #[test]
    fn test_concurrent_creation_yields_single_record() {
        let cache = Arc::new(ContentCache::new());
        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_create("same", 7, now).record.id)
            })
            .collect();
        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(cache.len(), 1);
    }
}
