//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with access tracking.

// == Cache Entry ==
/// Represents a single cached value and its recency metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored value, never interpreted by the cache
    pub value: String,
    /// Timestamp of the most recent read or write (milliseconds)
    pub last_access: u64,
    /// Insertion order, fixed for the lifetime of the key
    pub seq: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry accessed at `now`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `now` - Current clock reading in milliseconds
    /// * `seq` - Insertion order assigned by the store
    pub fn new(value: String, now: u64, seq: u64) -> Self {
        Self {
            value,
            last_access: now,
            seq,
        }
    }

    // == Touch ==
    /// Records an access at `now`.
    ///
    /// `last_access` never moves backwards, so a clock reading older than the
    /// stored one leaves it unchanged.
    pub fn touch(&mut self, now: u64) {
        self.last_access = self.last_access.max(now);
    }

    // == Replace ==
    /// Overwrites the value and records the write as an access.
    pub fn replace(&mut self, value: String, now: u64) {
        self.value = value;
        self.touch(now);
    }
}
