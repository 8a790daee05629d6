use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

use past_files::hasher::ContentHasher;
use past_files::platform::IdentityProvider;
use past_files::{
    Error, IdentityKey, ObservedFile, Outcome, PendingChanges, Reconciler, Result, TrackerState,
};

/// Hashes by looking the path up in a table the test controls.
#[derive(Default)]
struct TableHasher {
    hashes: Mutex<HashMap<String, String>>,
}

impl TableHasher {
    fn set(&self, path: &str, hash: &str) {
        self.hashes
            .lock()
            .unwrap()
            .insert(path.to_string(), hash.to_string());
    }
}

impl ContentHasher for TableHasher {
    fn hash_of(&self, path: &Path) -> Result<String> {
        let key = path.to_string_lossy().into_owned();
        self.hashes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no hash for {}", key)))
    }
}

struct NoIdentity;

impl IdentityProvider for NoIdentity {
    fn identity_of(&self, path: &Path) -> Result<IdentityKey> {
        Err(Error::identity_unavailable(path, "test provider"))
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn observe(path: &str, size: u64, write_secs: i64) -> ObservedFile {
    ObservedFile::new(Path::new(path), size, at(write_secs))
}

struct Fixture {
    state: TrackerState,
    pending: PendingChanges,
    hasher: TableHasher,
}

impl Fixture {
    fn new() -> Self {
        Self {
            state: TrackerState::new(),
            pending: PendingChanges::new(),
            hasher: TableHasher::default(),
        }
    }

    fn reconcile(&self, key: IdentityKey, observed: &ObservedFile, now: DateTime<Utc>) -> Outcome {
        Reconciler::new(&self.state, &self.pending, &NoIdentity, &self.hasher)
            .reconcile(key, observed, now)
            .unwrap()
    }
}

#[test]
fn test_new_file_creates_content_instance_and_history() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.txt", "H1");
    let key = IdentityKey::new(100, 1);

    let outcome = fx.reconcile(key, &observe("/a/b.txt", 10, 0), at(10));
    assert!(matches!(
        outcome,
        Outcome::Created {
            content_reused: false,
            size_mismatch: false,
            ..
        }
    ));

    assert_eq!(fx.state.contents.len(), 1);
    let content = fx.state.contents.get("H1").unwrap();
    assert_eq!(content.size, 10);
    assert_eq!(content.first_seen_global, at(10));

    let instance = fx.state.instances.find(&key).unwrap();
    assert_eq!(instance.current_path, "/a/b.txt");
    assert_eq!(instance.current_file_name, "b.txt");
    assert_eq!(instance.content_id, content.id);
    assert_eq!(instance.first_seen_instance, at(10));
    assert_eq!(instance.last_write_time, at(0));
    assert_eq!(instance.name_history.len(), 1);
    assert_eq!(instance.name_history[0].file_name, "b.txt");
    assert_eq!(instance.location_history.len(), 1);
    assert_eq!(instance.location_history[0].directory_path, "/a");

    let counts = fx.pending.counts();
    assert_eq!(counts.contents, 1);
    assert_eq!(counts.instances, 1);
    assert_eq!(counts.names, 1);
    assert_eq!(counts.locations, 1);
}

#[test]
fn test_rename_only_appends_one_name_entry() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.txt", "H1");
    let key = IdentityKey::new(100, 1);
    fx.reconcile(key, &observe("/a/b.txt", 10, 0), at(10));
    let content_before = fx.state.contents.get("H1").unwrap();

    let outcome = fx.reconcile(key, &observe("/a/c.txt", 10, 0), at(20));
    match outcome {
        Outcome::Updated { changes, .. } => {
            assert!(changes.renamed);
            assert!(!changes.moved);
            assert!(!changes.content_changed);
        }
        other => panic!("expected update, got {:?}", other),
    }

    let instance = fx.state.instances.find(&key).unwrap();
    assert_eq!(instance.current_path, "/a/c.txt");
    assert_eq!(instance.current_file_name, "c.txt");
    assert_eq!(instance.name_history.len(), 2);
    assert_eq!(instance.latest_name().unwrap().file_name, "c.txt");
    assert_eq!(instance.location_history.len(), 1);
    assert_eq!(fx.state.contents.get("H1").unwrap(), content_before);
}

#[test]
fn test_move_only_appends_one_location_entry() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.txt", "H1");
    let key = IdentityKey::new(100, 1);
    fx.reconcile(key, &observe("/a/b.txt", 10, 0), at(10));

    let outcome = fx.reconcile(key, &observe("/z/b.txt", 10, 0), at(20));
    match outcome {
        Outcome::Updated { changes, .. } => {
            assert!(changes.moved);
            assert!(!changes.renamed);
        }
        other => panic!("expected update, got {:?}", other),
    }

    let instance = fx.state.instances.find(&key).unwrap();
    assert_eq!(instance.name_history.len(), 1);
    assert_eq!(instance.location_history.len(), 2);
    assert_eq!(instance.latest_location().unwrap().directory_path, "/z");
    assert_eq!(instance.latest_location().unwrap().change_noticed_time, at(20));
}

#[test]
fn test_content_change_repoints_instance_and_keeps_old_content() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.txt", "H1");
    fx.hasher.set("/a/copy.txt", "H1");
    let key = IdentityKey::new(100, 1);
    let other = IdentityKey::new(101, 1);
    fx.reconcile(key, &observe("/a/b.txt", 10, 0), at(10));
    fx.reconcile(other, &observe("/a/copy.txt", 10, 0), at(10));
    let h1 = fx.state.contents.get("H1").unwrap();

    fx.hasher.set("/a/b.txt", "H2");
    let outcome = fx.reconcile(key, &observe("/a/b.txt", 12, 5), at(20));
    match outcome {
        Outcome::Updated { changes, .. } => {
            assert!(changes.content_changed);
            assert!(changes.write_time_changed);
            assert!(!changes.path_changed);
        }
        other => panic!("expected update, got {:?}", other),
    }

    let h2 = fx.state.contents.get("H2").unwrap();
    assert_eq!(h2.size, 12);
    let instance = fx.state.instances.find(&key).unwrap();
    assert_eq!(instance.content_id, h2.id);
    assert_eq!(instance.last_write_time, at(5));
    assert_eq!(instance.name_history.len(), 1);

    assert_eq!(fx.state.contents.get("H1").unwrap(), h1);
    let still_h1: Vec<_> = fx
        .state
        .instances
        .instances_with_content(h1.id)
        .into_iter()
        .map(|i| i.key)
        .collect();
    assert_eq!(still_h1, vec![other]);
}

#[test]
fn test_content_change_back_to_known_hash_reuses_record() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.txt", "H1");
    let key = IdentityKey::new(100, 1);
    fx.reconcile(key, &observe("/a/b.txt", 10, 0), at(10));
    let h1_id = fx.state.contents.get("H1").unwrap().id;

    fx.hasher.set("/a/b.txt", "H2");
    fx.reconcile(key, &observe("/a/b.txt", 10, 1), at(20));
    fx.hasher.set("/a/b.txt", "H1");
    fx.reconcile(key, &observe("/a/b.txt", 10, 2), at(30));

    assert_eq!(fx.state.contents.len(), 2);
    let instance = fx.state.instances.find(&key).unwrap();
    assert_eq!(instance.content_id, h1_id);
    assert_eq!(fx.state.contents.get("H1").unwrap().last_seen_global, at(30));
}

#[test]
fn test_identical_bytes_share_one_content() {
    let fx = Fixture::new();
    fx.hasher.set("/a/one.bin", "SAME");
    fx.hasher.set("/b/two.bin", "SAME");
    let first = IdentityKey::new(1, 7);
    let second = IdentityKey::new(2, 7);

    fx.reconcile(first, &observe("/a/one.bin", 64, 0), at(10));
    let outcome = fx.reconcile(second, &observe("/b/two.bin", 64, 0), at(11));
    assert!(matches!(
        outcome,
        Outcome::Created {
            content_reused: true,
            ..
        }
    ));

    assert_eq!(fx.state.contents.len(), 1);
    assert_eq!(fx.state.instances.len(), 2);
    let a = fx.state.instances.find(&first).unwrap();
    let b = fx.state.instances.find(&second).unwrap();
    assert_eq!(a.content_id, b.content_id);
    assert_ne!(a.id, b.id);
    assert_eq!(fx.state.contents.get("SAME").unwrap().last_seen_global, at(11));
}

#[test]
fn test_same_hash_with_different_size_keeps_recorded_size() {
    let fx = Fixture::new();
    fx.hasher.set("/a/original.bin", "H");
    fx.hasher.set("/b/suspect.bin", "H");
    fx.reconcile(IdentityKey::new(1, 1), &observe("/a/original.bin", 100, 0), at(10));

    let outcome = fx.reconcile(IdentityKey::new(2, 1), &observe("/b/suspect.bin", 200, 0), at(11));
    assert!(outcome.is_anomaly());
    assert!(matches!(
        outcome,
        Outcome::Created {
            size_mismatch: true,
            content_reused: true,
            ..
        }
    ));
    assert_eq!(fx.state.contents.get("H").unwrap().size, 100);
    assert_eq!(fx.state.contents.len(), 1);
}

#[test]
fn test_same_hash_size_drift_updates_size() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.bin", "H");
    let key = IdentityKey::new(1, 1);
    fx.reconcile(key, &observe("/a/b.bin", 100, 0), at(10));

    let outcome = fx.reconcile(key, &observe("/a/b.bin", 150, 3), at(20));
    match outcome {
        Outcome::Updated { changes, .. } => {
            assert!(changes.size_drift);
            assert!(!changes.content_changed);
        }
        other => panic!("expected update, got {:?}", other),
    }
    assert!(outcome.is_anomaly());
    assert_eq!(fx.state.contents.get("H").unwrap().size, 150);
}

#[test]
fn test_unchanged_rescan_writes_nothing() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.txt", "H1");
    let key = IdentityKey::new(100, 1);
    let observed = observe("/a/b.txt", 10, 0);
    fx.reconcile(key, &observed, at(10));
    let before = fx.state.instances.find(&key).unwrap();
    let pending_before = fx.pending.counts();

    let outcome = fx.reconcile(key, &observed, at(20));
    assert!(matches!(outcome, Outcome::Unchanged { .. }));

    let after = fx.state.instances.find(&key).unwrap();
    assert_eq!(after.name_history, before.name_history);
    assert_eq!(after.location_history, before.location_history);
    assert_eq!(after.content_id, before.content_id);
    assert_eq!(after.current_path, before.current_path);
    assert_eq!(after.last_seen_instance, at(20));
    assert_eq!(fx.pending.counts(), pending_before);
}

#[test]
fn test_rename_and_move_together() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.txt", "H1");
    let key = IdentityKey::new(100, 1);
    fx.reconcile(key, &observe("/a/b.txt", 10, 0), at(10));

    fx.reconcile(key, &observe("/z/q.txt", 10, 0), at(20));
    let instance = fx.state.instances.find(&key).unwrap();
    assert_eq!(instance.name_history.len(), 2);
    assert_eq!(instance.location_history.len(), 2);
    assert_eq!(instance.current_directory(), "/z");
}

#[test]
fn test_history_stays_monotonic_with_backwards_clock() {
    let fx = Fixture::new();
    fx.hasher.set("/a/b.txt", "H1");
    let key = IdentityKey::new(100, 1);
    fx.reconcile(key, &observe("/a/b.txt", 10, 0), at(100));
    fx.reconcile(key, &observe("/a/c.txt", 10, 0), at(50));
    fx.reconcile(key, &observe("/b/c.txt", 10, 0), at(200));

    let instance = fx.state.instances.find(&key).unwrap();
    let names: Vec<_> = instance
        .name_history
        .iter()
        .map(|e| e.change_noticed_time)
        .collect();
    assert!(names.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(instance.latest_name().unwrap().file_name, instance.current_file_name);
    assert_eq!(instance.latest_location().unwrap().directory_path, "/b");
}

#[test]
fn test_hash_failure_leaves_state_untouched() {
    let fx = Fixture::new();
    let key = IdentityKey::new(100, 1);
    let err = Reconciler::new(&fx.state, &fx.pending, &NoIdentity, &fx.hasher)
        .reconcile(key, &observe("/a/unhashable.bin", 1, 0), at(1))
        .unwrap_err();
    assert!(!err.is_skip());
    assert!(fx.state.instances.is_empty());
    assert!(fx.pending.is_empty());
}

#[test]
fn test_concurrent_workers_keep_uniqueness() {
    let fx = Arc::new(Fixture::new());
    for i in 0..64 {
        fx.hasher.set(&format!("/w/{}.bin", i), "SHARED");
    }
    fx.hasher.set("/w/link.bin", "LINKED");

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let fx = Arc::clone(&fx);
            thread::spawn(move || {
                for i in (worker..64).step_by(4) {
                    let key = IdentityKey::new(i as u64, 1);
                    fx.reconcile(key, &observe(&format!("/w/{}.bin", i), 8, 0), at(10));
                }
                // Every worker sees the same hard-linked identity.
                fx.reconcile(IdentityKey::new(9999, 1), &observe("/w/link.bin", 4, 0), at(10));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(fx.state.contents.len(), 2);
    assert_eq!(fx.state.instances.len(), 65);
    let shared = fx.state.contents.get("SHARED").unwrap();
    assert_eq!(fx.state.instances.instances_with_content(shared.id).len(), 64);
    let link = fx.state.instances.find(&IdentityKey::new(9999, 1)).unwrap();
    assert_eq!(link.name_history.len(), 1);
    assert_eq!(link.location_history.len(), 1);
    assert_eq!(fx.pending.counts().instances, 65);
}
