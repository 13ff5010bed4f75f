//! In-flight Registry Module
//!
//! Coalesces concurrent fetches of one key: the first caller leads the
//! fetch, callers arriving while it runs follow and receive its result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::FetchError;

/// Result published by a flight's leader.
pub type SharedResult = Result<String, FetchError>;

type Slot = Arc<watch::Sender<Option<SharedResult>>>;

// == Inflight Registry ==
/// Tracks the fetch currently running for each key.
///
/// A slot lives from the moment a leader is chosen until that leader
/// completes or is dropped. Callers that [`join`](Self::join) while a slot
/// exists become followers of it.
#[derive(Debug, Default)]
pub struct InflightRegistry {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Role handed out by [`InflightRegistry::join`].
#[derive(Debug)]
pub enum Flight<'a> {
    /// No fetch was running; the caller must run it and publish the result.
    Leader(FlightLeader<'a>),
    /// A fetch is running; wait for its result.
    Follower(FlightFollower),
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Join ==
    /// Leads a new flight for `key`, or follows the one already running.
    pub fn join(&self, key: &str) -> Flight<'_> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = slots.get(key) {
            return Flight::Follower(FlightFollower {
                receiver: slot.subscribe(),
            });
        }

        let (sender, _) = watch::channel(None);
        let slot = Arc::new(sender);
        slots.insert(key.to_string(), Arc::clone(&slot));

        Flight::Leader(FlightLeader {
            registry: self,
            key: key.to_string(),
            slot,
        })
    }

    /// Number of keys with a flight running.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `slot` if it is still the one registered for `key`.
    fn release(&self, key: &str, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }
}

// == Flight Leader ==
/// The caller responsible for fetching one key.
///
/// Dropping the leader without [`complete`](Self::complete), cancellation
/// included, ends the flight with no result; its followers then retry.
#[derive(Debug)]
pub struct FlightLeader<'a> {
    registry: &'a InflightRegistry,
    key: String,
    slot: Slot,
}

impl FlightLeader<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ends the flight and hands `result` to every follower.
    ///
    /// The slot is unregistered first, so callers arriving afterwards start
    /// a new flight instead of receiving this result.
    pub fn complete(self, result: SharedResult) {
        self.registry.release(&self.key, &self.slot);
        self.slot.send_replace(Some(result));
    }
}

impl Drop for FlightLeader<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.key, &self.slot);
    }
}

// == Flight Follower ==
/// A caller waiting on another caller's fetch.
#[derive(Debug)]
pub struct FlightFollower {
    receiver: watch::Receiver<Option<SharedResult>>,
}

impl FlightFollower {
    /// Waits for the leader's result.
    ///
    /// Returns `None` when the leader went away without completing.
    pub async fn wait(mut self) -> Option<SharedResult> {
        self.receiver
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| (*value).clone())
    }
}
