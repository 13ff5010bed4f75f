//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, fetches, failures and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Requests served from a fresh cached value
    pub hits: u64,
    /// Successful fetches for keys that had no cached value
    pub misses: u64,
    /// Successful fetches that replaced a stale cached value
    pub refreshes: u64,
    /// Fetches that failed or timed out
    pub failures: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of requests answered without calling the underlying fetch.
    ///
    /// Returns hits / (hits + misses + refreshes + failures), or 0.0 if no
    /// requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.refreshes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_refresh(&mut self) {
        self.refreshes += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
