use crate::model::{ContentId, IdentityKey, InstanceId, InstanceRecord};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// In-memory `IdentityKey -> InstanceRecord` map.
///
/// Uniqueness of the identity key is structural; there is no dedup logic here.
pub struct InstanceCache {
    by_key: DashMap<IdentityKey, InstanceRecord, RandomState>,
    next_id: AtomicI64,
}

impl Default for InstanceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceCache {
    pub fn new() -> Self {
        Self {
            by_key: DashMap::with_hasher(RandomState::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = InstanceRecord>) -> Self {
        let cache = Self::new();
        let mut max_id = 0;
        for record in records {
            max_id = max_id.max(record.id);
            cache.by_key.insert(record.key, record);
        }
        cache.next_id.store(max_id + 1, Ordering::SeqCst);
        cache
    }

    pub fn allocate_id(&self) -> InstanceId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn find(&self, key: &IdentityKey) -> Option<InstanceRecord> {
        self.by_key.get(key).map(|r| r.value().clone())
    }

    /// Read from a record without cloning it.
    pub fn peek<R>(&self, key: &IdentityKey, f: impl FnOnce(&InstanceRecord) -> R) -> Option<R> {
        self.by_key.get(key).map(|r| f(r.value()))
    }

    pub fn upsert(&self, key: IdentityKey, instance: InstanceRecord) {
        self.by_key.insert(key, instance);
    }

    /// Insert only if the key is absent, then run `then` while the entry is still
    /// locked. On conflict the record is handed back and `then` is not called.
    pub fn insert_new<R>(
        &self,
        instance: InstanceRecord,
        then: impl FnOnce(&InstanceRecord) -> R,
    ) -> Result<R, InstanceRecord> {
        match self.by_key.entry(instance.key) {
            Entry::Occupied(_) => Err(instance),
            Entry::Vacant(vacant) => {
                let inserted = vacant.insert(instance);
                Ok(then(inserted.value()))
            }
        }
    }

    /// Mutate a record in place while holding its entry lock.
    pub fn modify<R>(
        &self,
        key: &IdentityKey,
        f: impl FnOnce(&mut InstanceRecord) -> R,
    ) -> Option<R> {
        self.by_key.get_mut(key).map(|mut r| f(r.value_mut()))
    }

    /// Instances whose current content is `content_id`. Computed on demand.
    pub fn instances_with_content(&self, content_id: ContentId) -> Vec<InstanceRecord> {
        let mut found: Vec<InstanceRecord> = self
            .by_key
            .iter()
            .filter(|r| r.value().content_id == content_id)
            .map(|r| r.value().clone())
            .collect();
        found.sort_by_key(|i| i.id);
        found
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
