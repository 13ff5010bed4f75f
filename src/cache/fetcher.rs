//! Fetcher Module
//!
//! The underlying fetch operation the cache sits in front of.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::duration_ms;
use crate::error::FetchError;

// == Fetcher Trait ==
/// Produces the value for a key, or fails.
///
/// Implementations may block for a long time. They receive the deadline the
/// cache will enforce and should give up by then; the cache reports a
/// [`FetchError::Timeout`] either way once it passes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, key: &str, deadline: Instant) -> Result<String, FetchError>;
}

// == Closure Adapter ==
/// [`Fetcher`] backed by an async closure taking the key.
pub struct FnFetcher<F, Fut> {
    func: F,
    _marker: PhantomData<fn() -> Fut>,
}

/// Wraps `func` as a [`Fetcher`]. The deadline is enforced by the cache.
///
/// ```ignore
/// let fetcher = fetcher_fn(|key: String| async move {
///     Ok::<_, FetchError>(format!("value for {}", key))
/// });
/// ```
pub fn fetcher_fn<F, Fut>(func: F) -> FnFetcher<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, FetchError>> + Send,
{
    FnFetcher {
        func,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Fetcher for FnFetcher<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, FetchError>> + Send,
{
    async fn fetch(&self, key: &str, _deadline: Instant) -> Result<String, FetchError> {
        (self.func)(key.to_string()).await
    }
}

// == HTTP Fetcher ==
/// Fetches the key as a URL with an HTTP GET and returns the body text.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client (proxies, headers, TLS).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, key: &str, deadline: Instant) -> Result<String, FetchError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::ZERO {
            return Err(FetchError::timeout(key));
        }

        debug!(url = %key, timeout_ms = duration_ms(remaining), "Retrieving data from web");

        let response = self
            .client
            .get(key)
            .timeout(remaining)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| classify(key, err))?;

        response.text().await.map_err(|err| classify(key, err))
    }
}

fn classify(key: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        warn!(url = %key, "Upstream request timed out");
        FetchError::timeout(key)
    } else {
        warn!(url = %key, error = %err, "Upstream request failed");
        FetchError::upstream(key, err.to_string())
    }
}
