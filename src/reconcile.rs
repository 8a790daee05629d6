//! Per-file identity resolution and change detection.
//!
//! A path is resolved to its [`IdentityKey`] first. A known key takes the
//! update path (rename, move and content checks against the cached instance);
//! an unknown key is hashed and registered as a new instance. Every mutation
//! lands in the caches immediately and is staged for the next commit.

use crate::cache::TrackerState;
use crate::commit::{PendingChanges, Staged};
use crate::error::{Error, Result};
use crate::hasher::ContentHasher;
use crate::model::{ContentId, IdentityKey, InstanceId, InstanceRecord, ObservedFile};
use crate::platform::IdentityProvider;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// What changed on an already-known instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Changes {
    pub path_changed: bool,
    pub renamed: bool,
    pub moved: bool,
    pub write_time_changed: bool,
    pub content_changed: bool,
    /// Same hash as before but a different size. The content size was overwritten.
    pub size_drift: bool,
    /// The new hash was already known with a different size. The recorded size was kept.
    pub size_mismatch: bool,
}

impl Changes {
    pub fn any(&self) -> bool {
        self.path_changed || self.write_time_changed || self.content_changed || self.size_drift
    }

    pub fn is_anomaly(&self) -> bool {
        self.size_drift || self.size_mismatch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created {
        instance_id: InstanceId,
        content_id: ContentId,
        /// The content hash was already known, so this file is a duplicate.
        content_reused: bool,
        size_mismatch: bool,
    },
    Updated {
        instance_id: InstanceId,
        changes: Changes,
    },
    Unchanged {
        instance_id: InstanceId,
    },
}

impl Outcome {
    pub fn instance_id(&self) -> InstanceId {
        match self {
            Outcome::Created { instance_id, .. }
            | Outcome::Updated { instance_id, .. }
            | Outcome::Unchanged { instance_id } => *instance_id,
        }
    }

    pub fn is_anomaly(&self) -> bool {
        match self {
            Outcome::Created { size_mismatch, .. } => *size_mismatch,
            Outcome::Updated { changes, .. } => changes.is_anomaly(),
            Outcome::Unchanged { .. } => false,
        }
    }
}

pub struct Reconciler<'a> {
    state: &'a TrackerState,
    pending: &'a PendingChanges,
    identity: &'a dyn IdentityProvider,
    hasher: &'a dyn ContentHasher,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        state: &'a TrackerState,
        pending: &'a PendingChanges,
        identity: &'a dyn IdentityProvider,
        hasher: &'a dyn ContentHasher,
    ) -> Self {
        Self {
            state,
            pending,
            identity,
            hasher,
        }
    }

    /// Resolve and reconcile one path from the filesystem.
    ///
    /// `Error::IdentityUnavailable` means the file should be skipped; any other
    /// error is a failure for this file only.
    pub fn process_path(&self, path: &Path, now: DateTime<Utc>) -> Result<Outcome> {
        let key = self.identity.identity_of(path)?;
        let metadata = fs::metadata(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::identity_unavailable(path, "file disappeared"),
            _ => Error::from(err),
        })?;
        if !metadata.is_file() {
            return Err(Error::InvalidPath(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let observed = ObservedFile::from_metadata(path, &metadata)?;
        self.reconcile(key, &observed, now)
    }

    /// Reconcile an observation whose identity is already known.
    pub fn reconcile(
        &self,
        key: IdentityKey,
        observed: &ObservedFile,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        if self.state.instances.peek(&key, |_| ()).is_some() {
            self.update_existing(key, observed, now)
        } else {
            self.create_new(key, observed, now)
        }
    }

    fn update_existing(
        &self,
        key: IdentityKey,
        observed: &ObservedFile,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let known_write_time = self
            .state
            .instances
            .peek(&key, |instance| instance.last_write_time)
            .ok_or_else(|| Error::Other(format!("instance {} disappeared from cache", key)))?;

        // Hash before taking the entry lock; the write time is the only trigger.
        let new_hash = if known_write_time != observed.last_write_time {
            Some(self.hasher.hash_of(Path::new(&observed.path))?)
        } else {
            None
        };

        let result = self.state.instances.modify(&key, |instance| {
            let (changes, staged) = self.apply_observation(instance, observed, new_hash.as_deref(), now);
            if changes.any() {
                self.pending.stage(Staged {
                    instance: Some(key),
                    ..staged
                });
            }
            (instance.id, changes)
        });
        let (instance_id, changes) = result
            .ok_or_else(|| Error::Other(format!("instance {} disappeared from cache", key)))?;

        if changes.renamed || changes.moved {
            info!(
                path = %observed.path,
                renamed = changes.renamed,
                moved = changes.moved,
                "Instance {} relocated", instance_id
            );
        }
        if changes.content_changed {
            info!(path = %observed.path, "Content changed for instance {}", instance_id);
        }

        if changes.any() {
            Ok(Outcome::Updated {
                instance_id,
                changes,
            })
        } else {
            Ok(Outcome::Unchanged { instance_id })
        }
    }

    /// Apply path and content updates to a locked instance. Returns the history
    /// and content keys to stage; the caller decides whether the instance is dirty.
    fn apply_observation(
        &self,
        instance: &mut InstanceRecord,
        observed: &ObservedFile,
        new_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> (Changes, Staged) {
        let mut changes = Changes::default();
        let mut staged = Staged::default();

        instance.last_seen_instance = now;

        let path_change = self.state.history.apply_path_change(
            instance,
            &observed.path,
            &observed.directory,
            &observed.file_name,
            now,
        );
        changes.path_changed = path_change.path_changed;
        changes.renamed = path_change.renamed();
        changes.moved = path_change.moved();
        staged.names.extend(path_change.name);
        staged.locations.extend(path_change.location);

        let Some(hash) = new_hash else {
            return (changes, staged);
        };

        if instance.last_write_time != observed.last_write_time {
            instance.last_write_time = observed.last_write_time;
            changes.write_time_changed = true;
        }

        let current_hash = self.state.contents.hash_of(instance.content_id);
        if current_hash.as_deref() != Some(hash) {
            let lookup = self.state.contents.get_or_create(hash, observed.size, now);
            instance.content_id = lookup.record.id;
            changes.content_changed = true;
            changes.size_mismatch = lookup.size_mismatch;
            staged.contents.push(hash.to_string());
        } else {
            match self.state.contents.update_size(hash, observed.size) {
                Some(previous) if previous != observed.size => {
                    warn!(
                        hash = %hash,
                        previous_size = previous,
                        observed_size = observed.size,
                        path = %observed.path,
                        "Same hash reported with a different size, updating content size"
                    );
                    changes.size_drift = true;
                    staged.contents.push(hash.to_string());
                }
                _ => {}
            }
        }

        (changes, staged)
    }

    fn create_new(
        &self,
        key: IdentityKey,
        observed: &ObservedFile,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let hash = self.hasher.hash_of(Path::new(&observed.path))?;
        let lookup = self.state.contents.get_or_create(&hash, observed.size, now);

        let mut instance = InstanceRecord {
            id: self.state.instances.allocate_id(),
            key,
            content_id: lookup.record.id,
            current_path: observed.path.clone(),
            current_file_name: observed.file_name.clone(),
            last_write_time: observed.last_write_time,
            first_seen_instance: now,
            last_seen_instance: now,
            location_history: Vec::new(),
            name_history: Vec::new(),
        };
        let name = self
            .state
            .history
            .record_name(&mut instance, &observed.file_name, now);
        let location = self
            .state
            .history
            .record_location(&mut instance, &observed.directory, now);

        let staged = Staged {
            contents: vec![hash.clone()],
            instance: Some(key),
            locations: vec![location],
            names: vec![name],
        };
        let inserted = self
            .state
            .instances
            .insert_new(instance, |instance| {
                self.pending.stage(staged);
                instance.id
            });

        match inserted {
            Ok(instance_id) => {
                debug!(
                    path = %observed.path,
                    hash = %hash,
                    reused = !lookup.created,
                    "New instance {} for {}", instance_id, key
                );
                Ok(Outcome::Created {
                    instance_id,
                    content_id: lookup.record.id,
                    content_reused: !lookup.created,
                    size_mismatch: lookup.size_mismatch,
                })
            }
            Err(_) => {
                // Another worker registered this identity first (hard link).
                if lookup.is_dirty() {
                    self.pending.stage(Staged {
                        contents: vec![hash],
                        ..Default::default()
                    });
                }
                debug!(path = %observed.path, "Identity {} registered concurrently", key);
                self.update_existing(key, observed, now)
            }
        }
    }
}
