//! # Crawling
//!
//! Listing discovery, the per-shop pipeline and the worker pool that drives it.

use std::time::Duration;

use crate::domain::services::{FetchError, ResourceFetcher};

pub mod listing_crawler;
pub mod shop_pipeline;
pub mod tasks;
pub mod worker_pool;

pub use listing_crawler::{CrawlError, DescriptorRefStream, ListingCrawler};
pub use shop_pipeline::{PipelineSettings, ShopPipeline};
pub use tasks::{FailureKind, ShopFailure, ShopInfo, ShopReport, ShopTask};
pub use worker_pool::{JobOutcome, WorkerPool};

/// Fetch `url`, giving up after `limit`.
///
/// The transport has its own timeout, but a stalled body read or a fake that
/// never answers must not hold a worker forever.
pub async fn fetch_with_timeout(
    fetcher: &dyn ResourceFetcher,
    url: &str,
    limit: Duration,
) -> Result<Vec<u8>, FetchError> {
    match tokio::time::timeout(limit, fetcher.fetch(url)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout { after: limit }),
    }
}
