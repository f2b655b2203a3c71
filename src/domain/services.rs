//! Domain services
//!
//! Seams between the pipeline and the outside world. The HTTP transport is
//! consumed only through [`ResourceFetcher`] so every stage can be driven by
//! fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Transport failure for a single resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl FetchError {
    /// Whether trying again later could succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout { .. } | Self::Body(_) | Self::Other(_) => true,
            Self::Status(status) => *status >= 500 || *status == 429,
            Self::InvalidUrl(_) | Self::TooManyRedirects => false,
        }
    }
}

/// `fetch(url) -> bytes | failure`
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
