//! C1: a deduplicating set of content-addressed packet hashes.
//!
//! Lookup and insertion are amortized O(1) (backed by a `HashSet`); the set
//! is unbounded within a session and owned by the session, so it is
//! discarded wholesale when the session ends rather than needing eviction.

use beacon_core::Hash32;
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Default)]
pub struct ArrivalSet {
    seen: Mutex<HashSet<Hash32>>,
}

impl ArrivalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: inserting the same hash twice has the same effect as
    /// inserting it once. Returns whether this was the first insertion.
    pub fn put(&self, hash: Hash32) -> bool {
        self.seen.lock().insert(hash)
    }

    pub fn exists(&self, hash: Hash32) -> bool {
        self.seen.lock().contains(&hash)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
