//! API client for the remote document service
//!
//! This module contains the single-flight HTTP layer:
//! - Tenant access token lifecycle with refresh-before-expiry
//! - Request pipeline: rate limiter, retry with backoff, envelope validation
//! - Pagination helpers
//! - Multi-candidate wiki node lookup
//! - Raw content and file download endpoints

mod client;
mod limiter;
mod types;

pub use client::{ApiClient, DownloadedFile};
pub use limiter::RateLimiter;
pub use types::{DocumentMeta, TenantAccessToken, WikiNode};

use thiserror::Error;

/// API failure classification
///
/// The retry driver dispatches on [`ApiError::is_retriable`]: rate limits and
/// server-side errors are transient, everything else surfaces immediately.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Rate limited on {endpoint}: {message}")]
    RateLimited { endpoint: String, message: String },

    #[error("Server error {status} on {endpoint}")]
    Server { endpoint: String, status: u16 },

    #[error("Service error {code} on {endpoint}: {message}")]
    Service {
        endpoint: String,
        code: i64,
        message: String,
    },

    #[error("Transport error on {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid response envelope on {endpoint}: {message}")]
    Envelope { endpoint: String, message: String },

    #[error("Response shape mismatch on {endpoint}: {message}")]
    Shape { endpoint: String, message: String },

    #[error("Wiki node lookup failed for {token}; candidates: {attempts}")]
    NodeLookup { token: String, attempts: String },

    #[error("Retries exhausted on {endpoint} after {attempts} attempts: {last}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        last: String,
    },
}

impl ApiError {
    /// Whether the retry driver may attempt this request again
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Server { .. })
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;
