//! API Handlers
//!
//! HTTP request handlers for each page cache endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::cache::{FetchCache, HttpFetcher};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{CountResponse, HealthResponse, PageQuery, PageResponse, StatsResponse};

/// Application state shared across all handlers.
///
/// The cache does its own locking, so handlers share it through an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Page cache in front of the upstream fetcher
    pub cache: Arc<FetchCache>,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: FetchCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds an HTTP-backed cache with the configured capacity, TTL and
    /// fetch policy.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = FetchCache::new(config.into(), Arc::new(HttpFetcher::new()))?;
        Ok(Self::new(cache))
    }
}

fn validated(query: &PageQuery) -> Result<&str> {
    match query.validate() {
        Some(error_msg) => Err(CacheError::InvalidRequest(error_msg)),
        None => Ok(query.url.trim()),
    }
}

/// Handler for GET /page?url=...
///
/// Returns the page through the cache, fetching it upstream when it is
/// missing or stale.
pub async fn page_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse>> {
    let url = validated(&query)?;
    let result = state.cache.lookup(url).await?;

    Ok(Json(PageResponse::new(url, result)))
}

/// Handler for GET /count?url=...
///
/// Returns how many times the page was requested since it was cached.
pub async fn count_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CountResponse>> {
    let url = validated(&query)?;
    let call_count = state.cache.call_count(url).await;

    Ok(Json(CountResponse::new(url, call_count)))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().await.into())
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
