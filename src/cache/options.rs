//! Cache Options
//!
//! Construction-time settings for [`FetchCache`](crate::cache::FetchCache).

use std::time::Duration;

use crate::cache::eviction::DEFAULT_EVICTION_LOG_LEN;

/// Settings fixed for the lifetime of a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Maximum number of entries; must be at least 1
    pub capacity: usize,
    /// How long after a refresh a value is served without refetching
    pub ttl: Duration,
    /// Deadline given to each underlying fetch
    pub fetch_timeout: Duration,
    /// Allow only one in-flight fetch per key; concurrent callers wait for it
    pub suppress_duplicate_fetches: bool,
    /// Return the stale cached value when a refresh fails
    pub serve_stale_on_error: bool,
    /// How many evicted keys to remember
    pub eviction_log_len: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(10),
            suppress_duplicate_fetches: true,
            serve_stale_on_error: false,
            eviction_log_len: DEFAULT_EVICTION_LOG_LEN,
        }
    }
}

impl CacheOptions {
    /// Default options with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            ..Self::default()
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_duplicate_suppression(mut self, enabled: bool) -> Self {
        self.suppress_duplicate_fetches = enabled;
        self
    }

    pub fn with_stale_on_error(mut self, enabled: bool) -> Self {
        self.serve_stale_on_error = enabled;
        self
    }

    pub fn with_eviction_log_len(mut self, len: usize) -> Self {
        self.eviction_log_len = len;
        self
    }
}
