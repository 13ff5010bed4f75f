//! Request DTOs for the page cache API
//!
//! Defines the query parameters accepted by the HTTP endpoints.

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;

/// Query string for `GET /page` and `GET /count`
///
/// # Fields
/// - `url`: The page URL, used verbatim as the cache key
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    /// The page URL
    pub url: String,
}

impl PageQuery {
    /// Validates the query
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let url = self.url.trim();
        if url.is_empty() {
            return Some("URL cannot be empty".to_string());
        }
        if url.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "URL exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Some("URL must start with http:// or https://".to_string());
        }
        None
    }
}
