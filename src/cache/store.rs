//! Entry Store Module
//!
//! Key to entry storage combining a HashMap with O(1) LRU tracking.

use std::collections::HashMap;

use crate::cache::{CacheEntry, LruTracker};

// == Entry Store ==
/// Maps keys to cached values, ordered by recency.
///
/// Every `get` and `put` counts as an access: the entry moves to the most
/// recently used position and its `last_access` takes the supplied clock
/// reading. The store does not enforce capacity; see
/// [`EvictionPolicy`](crate::cache::EvictionPolicy).
#[derive(Debug, Default)]
pub struct EntryStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Next insertion order to hand out
    next_seq: u64,
}

impl EntryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &str, now: u64) -> Option<String> {
        let entry = self.entries.get_mut(key)?;
        entry.touch(now);
        self.lru.touch(key);
        Some(entry.value.clone())
    }

    // == Touch ==
    /// Marks `key` most recently used without reading it.
    ///
    /// Returns `false` when the key is not stored.
    pub fn touch(&mut self, key: &str, now: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                self.lru.touch(key);
                true
            }
            None => false,
        }
    }

    // == Peek ==
    /// Returns the entry for `key` without counting an access.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Put ==
    /// Inserts or overwrites `key` and marks it most recently used.
    ///
    /// Returns `true` when the key was already present.
    pub fn put(&mut self, key: String, value: String, now: u64) -> bool {
        let existed = match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.replace(value, now);
                true
            }
            None => {
                let entry = CacheEntry::new(value, now, self.next_seq);
                self.next_seq += 1;
                self.entries.insert(key.clone(), entry);
                false
            }
        };
        self.lru.touch(&key);
        existed
    }

    // == Remove ==
    /// Removes `key`, returning its entry if present.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        Some(entry)
    }

    // == Evict Least Recently Used ==
    /// Removes the least recently used entry and returns its key.
    ///
    /// Returns None if the store is empty.
    pub fn evict_least_recently_used(&mut self) -> Option<String> {
        let key = self.lru.evict_oldest()?;
        self.entries.remove(&key);
        Some(key)
    }

    // == Peek Eviction Candidate ==
    /// Returns the key that would be evicted next.
    pub fn peek_least_recently_used(&self) -> Option<&str> {
        self.lru.peek_oldest()
    }

    // == Contains ==
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Size ==
    /// Returns the current number of entries in the store.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Recency Order ==
    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<&str> {
        self.lru.oldest_first()
    }
}
