//! Cache Statistics Module
//!
//! Counts completed cache operations: hits, misses, sets and deletes.

// == Cache Stats ==
/// Operation counters owned by a [`CacheStore`](super::CacheStore).
///
/// Counters only move forward; they are bumped after the backend confirms
/// an operation and cleared only by an explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a payload
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Confirmed writes
    pub sets: u64,
    /// Keys requested for deletion in confirmed delete calls
    pub deletes: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hits(&mut self, count: u64) {
        self.hits += count;
    }

    pub fn record_misses(&mut self, count: u64) {
        self.misses += count;
    }

    pub fn record_sets(&mut self, count: u64) {
        self.sets += count;
    }

    pub fn record_deletes(&mut self, count: u64) {
        self.deletes += count;
    }
}
