//! Response DTOs for the page cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, FetchOutcome, FetchResult};

/// Response body for `GET /page`
#[derive(Debug, Clone, Serialize)]
pub struct PageResponse {
    /// The requested URL
    pub url: String,
    /// The page body
    pub content: String,
    /// How the page was obtained (hit, miss, refresh, stale)
    pub status: FetchOutcome,
    /// Requests for this URL so far, this one included
    pub call_count: u64,
}

impl PageResponse {
    pub fn new(url: impl Into<String>, result: FetchResult) -> Self {
        Self {
            url: url.into(),
            content: result.value,
            status: result.outcome,
            call_count: result.call_count,
        }
    }
}

/// Response body for `GET /count`
#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub url: String,
    pub call_count: u64,
}

impl CountResponse {
    pub fn new(url: impl Into<String>, call_count: u64) -> Self {
        Self {
            url: url.into(),
            call_count,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Requests answered from a fresh cached page
    pub hits: u64,
    /// First fetches of a URL
    pub misses: u64,
    /// Refetches of a stale page
    pub refreshes: u64,
    /// Failed or timed out fetches
    pub failures: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Share of requests served without an upstream fetch
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            refreshes: stats.refreshes,
            failures: stats.failures,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
