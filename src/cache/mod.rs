//! Cache Module
//!
//! Size-bounded, time-expiring cache in front of a fetch function, with LRU
//! eviction and per-key call counting.

mod clock;
mod entry;
mod eviction;
mod expiration;
mod facade;
mod fetcher;
mod history;
mod inflight;
mod lru;
mod options;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, duration_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use eviction::{EvictionPolicy, DEFAULT_EVICTION_LOG_LEN};
pub use expiration::{ExpirationPolicy, ExpirationRecord};
pub use facade::{FetchCache, FetchResult};
pub use fetcher::{fetcher_fn, Fetcher, FnFetcher, HttpFetcher};
pub use history::{CallHistory, FetchEvent, FetchObserver, FetchOutcome};
pub use inflight::{Flight, FlightFollower, FlightLeader, InflightRegistry, SharedResult};
pub use lru::LruTracker;
pub use options::CacheOptions;
pub use stats::CacheStats;
pub use store::EntryStore;

// == Public Constants ==
/// Maximum accepted key (URL) length in bytes at the HTTP boundary
pub const MAX_KEY_LENGTH: usize = 2048;
