//! Error types for the page cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Fetch Error Enum ==
/// Failure reported by (or on behalf of) the underlying fetch function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The fetch did not complete before its deadline
    #[error("Fetch timed out: {key}")]
    Timeout { key: String },

    /// The upstream reported a failure
    #[error("Upstream fetch failed for {key}: {message}")]
    Upstream { key: String, message: String },
}

impl FetchError {
    /// Builds an upstream failure for `key`.
    pub fn upstream(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Builds a timeout for `key`.
    pub fn timeout(key: impl Into<String>) -> Self {
        Self::Timeout { key: key.into() }
    }

    /// The key whose fetch failed.
    pub fn key(&self) -> &str {
        match self {
            FetchError::Timeout { key } | FetchError::Upstream { key, .. } => key,
        }
    }
}

// == Cache Error Enum ==
/// Unified error type for the page cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The underlying fetch failed and no cached value could stand in
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Capacity must be at least one entry
    #[error("Capacity misconfigured: {0} (must be at least 1)")]
    CapacityMisconfigured(usize),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal bookkeeping error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Fetch(FetchError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Fetch(FetchError::Upstream { .. }) => StatusCode::BAD_GATEWAY,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::CapacityMisconfigured(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the page cache.
pub type Result<T> = std::result::Result<T, CacheError>;
