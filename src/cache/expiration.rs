//! Expiration Policy Module
//!
//! Per-key call counting and refresh timestamps that decide freshness.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::duration_ms;

// == Expiration Record ==
/// Call count and refresh time for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationRecord {
    /// Fetch requests since the record was created, hits included
    pub call_count: u64,
    /// When the underlying fetch last stored a value (milliseconds)
    pub last_refresh: u64,
}

impl ExpirationRecord {
    /// Whether the last refresh is at most `ttl` old at `now`.
    ///
    /// A `now` earlier than `last_refresh` counts as zero elapsed time.
    pub fn is_fresh(&self, ttl: Duration, now: u64) -> bool {
        now.saturating_sub(self.last_refresh) <= duration_ms(ttl)
    }
}

// == Expiration Policy ==
/// Tracks an [`ExpirationRecord`] per key.
#[derive(Debug, Default)]
pub struct ExpirationPolicy {
    records: HashMap<String, ExpirationRecord>,
}

impl ExpirationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    // == Is Fresh ==
    /// Whether `key` may be served without refetching.
    ///
    /// A key without a record is never fresh.
    pub fn is_fresh(&self, key: &str, ttl: Duration, now: u64) -> bool {
        self.records
            .get(key)
            .is_some_and(|record| record.is_fresh(ttl, now))
    }

    // == Record Access ==
    /// Counts one fetch request for `key` and returns the new call count.
    ///
    /// When `refreshed` is set the underlying fetch actually ran, so
    /// `last_refresh` moves to `now` and a missing record is created.
    /// Without it, only an existing record's count advances; a key with no
    /// record is left untracked and 0 is returned.
    pub fn record_access(&mut self, key: &str, now: u64, refreshed: bool) -> u64 {
        if refreshed {
            let record = self
                .records
                .entry(key.to_string())
                .or_insert(ExpirationRecord {
                    call_count: 0,
                    last_refresh: now,
                });
            record.call_count += 1;
            record.last_refresh = now;
            return record.call_count;
        }

        match self.records.get_mut(key) {
            Some(record) => {
                record.call_count += 1;
                record.call_count
            }
            None => 0,
        }
    }

    // == Lookups ==
    pub fn record(&self, key: &str) -> Option<&ExpirationRecord> {
        self.records.get(key)
    }

    /// Call count for `key`, 0 when untracked.
    pub fn call_count(&self, key: &str) -> u64 {
        self.records.get(key).map_or(0, |record| record.call_count)
    }

    // == Remove ==
    /// Drops the record for `key`; the next refresh starts a new one.
    pub fn remove(&mut self, key: &str) -> Option<ExpirationRecord> {
        self.records.remove(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
