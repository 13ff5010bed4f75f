//! Page Cache - A size-bounded, time-expiring cache in front of slow fetches
//!
//! Serves values from memory while they are fresh, refetches them once their
//! TTL has passed, evicts the least recently used entry when full, and counts
//! every request per key.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use cache::{CacheOptions, FetchCache, Fetcher};
pub use config::Config;
pub use error::{CacheError, FetchError};
