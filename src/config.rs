//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheOptions;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of pages the cache can hold
    pub max_entries: usize,
    /// Seconds a fetched page is served without refetching
    pub ttl_secs: u64,
    /// Seconds an upstream fetch may take before it times out
    pub fetch_timeout_secs: u64,
    /// Coalesce concurrent fetches of the same URL
    pub suppress_duplicate_fetches: bool,
    /// Serve the stale page when a refresh fails
    pub serve_stale_on_error: bool,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_TTL` - Freshness window in seconds (default: 10)
    /// - `FETCH_TIMEOUT` - Upstream fetch timeout in seconds (default: 10)
    /// - `SUPPRESS_DUPLICATE_FETCHES` - `true`/`false` (default: true)
    /// - `SERVE_STALE_ON_ERROR` - `true`/`false` (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            ttl_secs: env_or("CACHE_TTL", defaults.ttl_secs),
            fetch_timeout_secs: env_or("FETCH_TIMEOUT", defaults.fetch_timeout_secs),
            suppress_duplicate_fetches: env_or(
                "SUPPRESS_DUPLICATE_FETCHES",
                defaults.suppress_duplicate_fetches,
            ),
            serve_stale_on_error: env_or("SERVE_STALE_ON_ERROR", defaults.serve_stale_on_error),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_secs: 10,
            fetch_timeout_secs: 10,
            suppress_duplicate_fetches: true,
            serve_stale_on_error: false,
            server_port: 3000,
        }
    }
}

impl From<&Config> for CacheOptions {
    fn from(config: &Config) -> Self {
        CacheOptions::new(config.max_entries, Duration::from_secs(config.ttl_secs))
            .with_fetch_timeout(Duration::from_secs(config.fetch_timeout_secs))
            .with_duplicate_suppression(config.suppress_duplicate_fetches)
            .with_stale_on_error(config.serve_stale_on_error)
    }
}
