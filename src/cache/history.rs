//! Fetch Observers
//!
//! Notification hook run after every fetch, and a call-history recorder built on it.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

// == Fetch Outcome ==
/// How a fetch request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchOutcome {
    /// Fresh cached value, underlying fetch skipped
    Hit,
    /// No cached value; fetched and stored
    Miss,
    /// Stale cached value replaced by a new fetch
    Refresh,
    /// Refresh failed; stale cached value returned instead
    Stale,
    /// Fetch failed and nothing could stand in
    Failed,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Refresh => write!(f, "REFRESH"),
            Self::Stale => write!(f, "STALE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// == Fetch Event ==
/// What the cache did for one `fetch` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchEvent {
    pub key: String,
    pub outcome: FetchOutcome,
    /// The key's call count after this request, 0 when untracked
    pub call_count: u64,
    /// Returned value, or the error message for [`FetchOutcome::Failed`]
    pub output: String,
    /// Clock reading when the request completed (milliseconds)
    pub at: u64,
}

// == Observer Trait ==
/// Notified by the cache after each fetch, outside the cache lock.
pub trait FetchObserver: Send + Sync {
    fn on_fetch(&self, event: &FetchEvent);
}

// == Call History ==
/// Records every fetch per key, inputs and outputs in call order.
///
/// Each key keeps at most `limit` events; older ones are dropped first.
/// Keys themselves are kept until [`clear`](Self::clear), so memory grows
/// with the number of distinct keys seen. Meant for tests and debugging
/// sessions, not for long-running servers.
#[derive(Debug)]
pub struct CallHistory {
    events: Mutex<HashMap<String, VecDeque<FetchEvent>>>,
    limit: usize,
}

impl Default for CallHistory {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl CallHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            limit,
        }
    }

    /// Events recorded for `key`, oldest first.
    pub fn events(&self, key: &str) -> Vec<FetchEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Outputs returned for `key`, oldest first.
    pub fn outputs(&self, key: &str) -> Vec<String> {
        self.events(key).into_iter().map(|e| e.output).collect()
    }

    /// Human readable call log for `key`.
    ///
    /// ```text
    /// fetch was called 2 times for http://example.com:
    /// fetch(http://example.com) -> MISS <html>...
    /// fetch(http://example.com) -> HIT <html>...
    /// ```
    pub fn replay(&self, key: &str) -> String {
        let events = self.events(key);
        let mut out = format!("fetch was called {} times for {}:", events.len(), key);
        for event in &events {
            out.push_str(&format!(
                "\nfetch({}) -> {} {}",
                event.key, event.outcome, event.output
            ));
        }
        out
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl FetchObserver for CallHistory {
    fn on_fetch(&self, event: &FetchEvent) {
        if self.limit == 0 {
            return;
        }
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let log = events.entry(event.key.clone()).or_default();
        if log.len() == self.limit {
            log.pop_front();
        }
        log.push_back(event.clone());
    }
}
