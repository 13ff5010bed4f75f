//! Eviction Policy Module
//!
//! Keeps the entry store within its configured capacity.

use std::collections::VecDeque;

use tracing::{debug, error};

use crate::cache::EntryStore;
use crate::error::{CacheError, Result};

/// Default number of evicted keys remembered for inspection.
pub const DEFAULT_EVICTION_LOG_LEN: usize = 64;

// == Eviction Policy ==
/// Evicts least recently used entries while the store is over capacity.
#[derive(Debug)]
pub struct EvictionPolicy {
    capacity: usize,
    /// Most recent evictions, oldest at the front
    log: VecDeque<String>,
    log_len: usize,
}

impl EvictionPolicy {
    // == Constructor ==
    /// Creates a policy for `capacity` entries remembering the last
    /// `log_len` evicted keys.
    pub fn new(capacity: usize, log_len: usize) -> Self {
        Self {
            capacity,
            log: VecDeque::with_capacity(log_len),
            log_len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // == Enforce Capacity ==
    /// Evicts one entry per excess until `store.size() <= capacity`.
    ///
    /// Returns the evicted keys, least recently used first. Running out of
    /// entries while still over capacity means the store's bookkeeping is
    /// corrupt: debug builds panic, release builds log and return
    /// [`CacheError::Internal`].
    pub fn enforce_capacity(&mut self, store: &mut EntryStore) -> Result<Vec<String>> {
        let mut evicted = Vec::new();

        while store.size() > self.capacity {
            let Some(key) = store.evict_least_recently_used() else {
                debug_assert!(false, "store over capacity but has no eviction candidate");
                error!(
                    size = store.size(),
                    capacity = self.capacity,
                    "Store over capacity with no eviction candidate"
                );
                return Err(CacheError::Internal(
                    "store over capacity with no eviction candidate".to_string(),
                ));
            };

            debug!(key = %key, "Evicted least recently used entry");
            self.remember(key.clone());
            evicted.push(key);
        }

        Ok(evicted)
    }

    // == Recently Evicted ==
    /// The last evicted keys, oldest first.
    pub fn recently_evicted(&self) -> Vec<String> {
        self.log.iter().cloned().collect()
    }

    fn remember(&mut self, key: String) {
        if self.log_len == 0 {
            return;
        }
        if self.log.len() == self.log_len {
            self.log.pop_front();
        }
        self.log.push_back(key);
    }
}
