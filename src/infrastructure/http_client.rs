//! HTTP transport for listing pages, descriptors and feeds
//!
//! Wraps reqwest with a process-wide rate limiter and maps every transport
//! problem onto [`FetchError`], so callers never see reqwest types.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client,
};
use tracing::{debug, warn};

use crate::domain::services::{FetchError, ResourceFetcher};
use crate::infrastructure::config::{defaults, HttpConfig};

/// HTTP client configuration
#[derive(Debug, Clone, serde::Serialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub max_redirects: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::HTTP_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_redirects: defaults::MAX_REDIRECTS,
        }
    }
}

impl From<&HttpConfig> for HttpClientConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout_seconds: config.timeout_seconds,
            max_requests_per_second: config.max_requests_per_second,
            max_redirects: config.max_redirects,
        }
    }
}

/// Rate-limited HTTP client
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Fetch a URL and return the full body.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        self.rate_limiter.until_ready().await;
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP {} for {}", status.as_u16(), url);
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                self.timeout()
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body.to_vec())
    }

    fn timeout(&self) -> FetchError {
        FetchError::Timeout {
            after: Duration::from_secs(self.config.timeout_seconds),
        }
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            self.timeout()
        } else if err.is_redirect() {
            FetchError::TooManyRedirects
        } else if err.is_builder() {
            FetchError::InvalidUrl(err.to_string())
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else {
            FetchError::Other(err.to_string())
        }
    }
}

#[async_trait]
impl ResourceFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get_bytes(url).await
    }
}
