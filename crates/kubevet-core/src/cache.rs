//! In-memory outcome cache.
//!
//! Remembers the last validation outcome per object identity together with
//! the resource version it was computed for, so unchanged objects are not
//! re-validated.
//!
//! # Staleness
//!
//! ```text
//! is_already_validated(obj)
//!   ├─ no entry for key             → false
//!   ├─ entry.version == obj.version → true   (skip the check engine)
//!   └─ entry.version != obj.version → evict, false
//! ```
//!
//! Only the resource version decides staleness. The stored UID is kept as
//! secondary identity and is not compared.
//!
//! All operations serialize on a single mutex and every critical section is a
//! single map access.
//!
//! # Drain epochs
//!
//! Every [`drain`](OutcomeCache::drain) bumps the cache epoch. A caller that
//! computes an outcome slowly reads [`epoch`](OutcomeCache::epoch) first and
//! stores with [`store_unless_drained`](OutcomeCache::store_unless_drained),
//! so an outcome computed before a drain never lands after it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::key::{IdentityKey, VersionTag};
use crate::object::ResourceObject;
use crate::outcome::ValidationOutcome;

/// Cached outcome for one object identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<O = ValidationOutcome> {
    /// Resource version the outcome was computed for.
    pub version: VersionTag,

    /// Object UID at capture time.
    pub uid: String,

    /// Outcome produced by the check engine.
    pub outcome: O,
}

impl<O> CacheEntry<O> {
    fn capture(obj: &(impl ResourceObject + ?Sized), outcome: O) -> Self {
        Self {
            version: VersionTag::of(obj),
            uid: obj.uid().to_string(),
            outcome,
        }
    }
}

#[derive(Debug)]
struct Entries<O> {
    map: HashMap<IdentityKey, CacheEntry<O>>,
    epoch: u64,
}

/// Concurrency-safe cache of validation outcomes keyed by [`IdentityKey`].
#[derive(Debug)]
pub struct OutcomeCache<O = ValidationOutcome> {
    entries: Mutex<Entries<O>>,
}

impl<O> Default for OutcomeCache<O> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                epoch: 0,
            }),
        }
    }
}

impl<O: Clone> OutcomeCache<O> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never leave the map half-updated, so a poisoned
    // lock still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, Entries<O>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache an outcome for the object's current resource version.
    ///
    /// Replaces any previous entry for the same identity; earlier outcomes
    /// are not preserved.
    pub fn store(&self, obj: &(impl ResourceObject + ?Sized), outcome: O) {
        let key = IdentityKey::from_object(obj);
        let entry = CacheEntry::capture(obj, outcome);
        self.lock().map.insert(key, entry);
    }

    /// Like [`store`](Self::store), but only if the cache has not been
    /// drained since `epoch` was read. Returns whether the outcome was
    /// stored.
    pub fn store_unless_drained(
        &self,
        obj: &(impl ResourceObject + ?Sized),
        outcome: O,
        epoch: u64,
    ) -> bool {
        let key = IdentityKey::from_object(obj);
        let mut entries = self.lock();
        if entries.epoch != epoch {
            drop(entries);
            debug!(key = %key, epoch, "cache drained while validating, outcome dropped");
            return false;
        }
        entries.map.insert(key, CacheEntry::capture(obj, outcome));
        true
    }

    /// Number of drains so far.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Uncache the outcome for the object. No-op if absent.
    pub fn remove(&self, obj: &(impl ResourceObject + ?Sized)) {
        self.remove_key(&IdentityKey::from_object(obj));
    }

    /// Delete a key and its entry. No-op if absent.
    pub fn remove_key(&self, key: &IdentityKey) {
        if self.lock().map.remove(key).is_some() {
            debug!(key = %key, "removed cached outcome");
        }
    }

    /// Whether an entry exists for the key.
    pub fn contains_key(&self, key: &IdentityKey) -> bool {
        self.lock().map.contains_key(key)
    }

    /// Look up the cached entry for the object. Does not check staleness.
    pub fn retrieve(&self, obj: &(impl ResourceObject + ?Sized)) -> Option<CacheEntry<O>> {
        let key = IdentityKey::from_object(obj);
        self.lock().map.get(&key).cloned()
    }

    /// Whether the object already has an outcome for its current resource
    /// version.
    ///
    /// A cached entry for an older resource version is evicted and `false`
    /// is returned. Lookup and eviction happen under one lock acquisition,
    /// so a concurrent `store` for the new version is never evicted by a
    /// reader holding the old one.
    pub fn is_already_validated(&self, obj: &(impl ResourceObject + ?Sized)) -> bool {
        let key = IdentityKey::from_object(obj);
        let mut entries = self.lock();

        let stale = match entries.map.get(&key) {
            None => return false,
            Some(entry) if entry.version.matches(obj) => return true,
            Some(entry) => entry.version.clone(),
        };

        entries.map.remove(&key);
        drop(entries);
        debug!(
            key = %key,
            cached = %stale,
            current = obj.resource_version(),
            "evicted stale outcome"
        );
        false
    }

    /// Discard every cached outcome and start a new epoch.
    pub fn drain(&self) {
        let (drained, epoch) = {
            let mut entries = self.lock();
            entries.epoch += 1;
            (std::mem::take(&mut entries.map), entries.epoch)
        };
        debug!(entries = drained.len(), epoch, "drained outcome cache");
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }
}
