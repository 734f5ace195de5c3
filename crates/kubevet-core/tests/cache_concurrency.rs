//! Multi-threaded stress tests for OutcomeCache.
//!
//! Workers hammer a small fixed key space with store / lookup / staleness
//! checks and the final map is checked for lost updates and phantom entries.

use kubevet_core::{IdentityKey, ObjectMeta, OutcomeCache};
use std::sync::{Arc, Barrier};
use std::thread;
use uuid::Uuid;

const KEYS: usize = 8;
const WORKERS: usize = 8;
const ROUNDS: usize = 2_000;

fn object(slot: usize, resource_version: usize) -> ObjectMeta {
    ObjectMeta::new("apps", "v1", "Deployment", "stress", format!("obj-{slot}"))
        .with_uid(format!("uid-{slot}"))
        .with_resource_version(resource_version.to_string())
}

/// Test: concurrent stores to overlapping keys never produce more than one
/// entry per key, and every surviving entry is one that was actually stored.
#[test]
fn test_overlapping_keys_stay_consistent() {
    let cache: Arc<OutcomeCache<(usize, usize)>> = Arc::new(OutcomeCache::new());
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let slot = (worker + round) % KEYS;
                    let obj = object(slot, round % 3);
                    if !cache.is_already_validated(&obj) {
                        cache.store(&obj, (worker, round % 3));
                    }
                    if let Some(entry) = cache.retrieve(&obj) {
                        // Whatever is cached was stored by someone for this key.
                        assert_eq!(entry.uid, format!("uid-{slot}"));
                        assert!(entry.outcome.0 < WORKERS);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.len() <= KEYS);
    for slot in 0..KEYS {
        let probe = object(slot, 0);
        if let Some(entry) = cache.retrieve(&probe) {
            // Entry's version and outcome were written together.
            assert_eq!(entry.version.as_str(), entry.outcome.1.to_string());
        }
    }
}

/// Test: stores on disjoint keys from many threads are never lost.
#[test]
fn test_disjoint_stores_are_not_lost() {
    let cache: Arc<OutcomeCache<usize>> = Arc::new(OutcomeCache::new());

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    let slot = worker * 100 + i;
                    cache.store(&object(slot, 1), slot);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), WORKERS * 100);
    for slot in 0..WORKERS * 100 {
        let obj = object(slot, 1);
        assert!(cache.is_already_validated(&obj));
        assert_eq!(cache.retrieve(&obj).unwrap().outcome, slot);
    }
}

/// Test: a reader evicting a stale entry never removes a fresher entry
/// stored concurrently for the new version.
#[test]
fn test_stale_eviction_does_not_drop_fresh_store() {
    for _ in 0..200 {
        let cache: Arc<OutcomeCache<&'static str>> = Arc::new(OutcomeCache::new());
        cache.store(&object(0, 1), "old");

        let writer = {
            let cache = cache.clone();
            thread::spawn(move || cache.store(&object(0, 2), "new"))
        };
        let reader = {
            let cache = cache.clone();
            thread::spawn(move || cache.is_already_validated(&object(0, 2)))
        };
        writer.join().unwrap();
        reader.join().unwrap();

        // The writer's entry for version 2 must survive either interleaving.
        let entry = cache.retrieve(&object(0, 2)).expect("fresh entry kept");
        assert_eq!(entry.outcome, "new");
        assert_eq!(entry.version.as_str(), "2");
    }
}

/// Test: drain racing with stores never corrupts the surviving entries.
#[test]
fn test_drain_during_stores() {
    let cache: Arc<OutcomeCache<usize>> = Arc::new(OutcomeCache::new());
    let barrier = Arc::new(Barrier::new(3));

    let writers: Vec<_> = (0..2)
        .map(|worker| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..500 {
                    cache.store(&object(worker * 1000 + i, 1), i);
                }
            })
        })
        .collect();

    barrier.wait();
    for _ in 0..50 {
        cache.drain();
    }
    for writer in writers {
        writer.join().unwrap();
    }

    // Whatever survived the drains is intact and retrievable by identity.
    let mut survivors = 0;
    for worker in 0..2 {
        for i in 0..500 {
            let obj = object(worker * 1000 + i, 1);
            if let Some(entry) = cache.retrieve(&obj) {
                assert_eq!(entry.outcome, i);
                assert!(cache.contains_key(&IdentityKey::from_object(&obj)));
                survivors += 1;
            }
        }
    }
    assert_eq!(survivors, cache.len());
    assert!(cache.len() <= 1000);

    cache.drain();
    assert!(cache.is_empty());
}

/// Test: deleting and recreating an object under the same name (new UID)
/// from several threads never lets the new incarnation hit a stale entry.
#[test]
fn test_recreated_objects_never_hit() {
    let cache: Arc<OutcomeCache<String>> = Arc::new(OutcomeCache::new());

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                let name = format!("web-{worker}");
                for _ in 0..50 {
                    let uid = Uuid::new_v4().to_string();
                    let obj = ObjectMeta::new("apps", "v1", "Deployment", "ns1", name.as_str())
                        .with_uid(uid.as_str())
                        .with_resource_version("1");
                    assert!(!cache.is_already_validated(&obj));
                    cache.store(&obj, uid.clone());
                    assert!(cache.is_already_validated(&obj));
                    cache.remove(&obj);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.is_empty());
}
