/*!
 * Process Registry
 *
 * Concurrency-safe map from application key to its running-process handle,
 * bounded by a global capacity.
 *
 * Registration is the only capacity enforcement point: the per-key presence
 * check happens under the key's shard lock and the capacity check is a
 * compare-and-swap reservation on the occupancy counter taken while that lock
 * is held. Unrelated keys only contend on the counter.
 */

use super::types::{RejectReason, Rejected};
use crate::core::types::AppKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct ProcessRegistry<H> {
    entries: DashMap<AppKey, Arc<H>>,
    // Never below entries.len(), never above capacity
    occupied: AtomicUsize,
    capacity: usize,
}

impl<H> ProcessRegistry<H> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            occupied: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Register `handle` under `key` if the key is free and a slot is available.
    ///
    /// Fails without mutation otherwise, returning the handle to the caller.
    pub fn try_register(&self, key: AppKey, handle: H) -> Result<Arc<H>, Rejected<H>> {
        match self.entries.entry(key) {
            Entry::Occupied(_) => Err(Rejected {
                reason: RejectReason::AlreadyRegistered,
                handle,
            }),
            Entry::Vacant(slot) => {
                if !self.reserve_slot() {
                    return Err(Rejected {
                        reason: RejectReason::AtCapacity {
                            capacity: self.capacity,
                        },
                        handle,
                    });
                }
                let handle = Arc::new(handle);
                slot.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    /// Remove and return the handle for `key`; absent keys are a no-op
    pub fn unregister(&self, key: &AppKey) -> Option<Arc<H>> {
        let (_, handle) = self.entries.remove(key)?;
        self.occupied.fetch_sub(1, Ordering::AcqRel);
        Some(handle)
    }

    /// Remove the handle for `key` only if `predicate` accepts the current one
    pub fn unregister_if<F>(&self, key: &AppKey, predicate: F) -> Option<Arc<H>>
    where
        F: FnOnce(&Arc<H>) -> bool,
    {
        let (_, handle) = self
            .entries
            .remove_if(key, |_, current| predicate(current))?;
        self.occupied.fetch_sub(1, Ordering::AcqRel);
        Some(handle)
    }

    pub fn lookup(&self, key: &AppKey) -> Option<Arc<H>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &AppKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Current global occupancy
    pub fn count(&self) -> usize {
        self.occupied.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of registered keys, in no particular order
    pub fn keys(&self) -> Vec<AppKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    fn reserve_slot(&self) -> bool {
        self.occupied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.capacity).then_some(current + 1)
            })
            .is_ok()
    }
}
