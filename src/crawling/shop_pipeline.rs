//! # Shop Pipeline
//!
//! Descriptor fetch → parse → feed fetch → normalize, for one shop. Stages run
//! strictly in sequence; every per-shop problem ends up in the report instead
//! of propagating.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::crawling::fetch_with_timeout;
use crate::crawling::tasks::{FailureKind, ShopFailure, ShopInfo, ShopReport, ShopTask};
use crate::domain::services::ResourceFetcher;
use crate::infrastructure::config::{defaults, AppConfig};
use crate::infrastructure::parsing::feed_normalizer::{FeedNormalizer, FeedOptions};
use crate::infrastructure::resource_cache::{CacheError, ResourceCache};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub fetch_timeout: Duration,
    /// Skip the feed when the descriptor declares no EAN column
    pub require_identifier_column: bool,
    pub feed_options: FeedOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(defaults::FETCH_TIMEOUT_SECONDS),
            require_identifier_column: true,
            feed_options: FeedOptions::default(),
        }
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.workers.fetch_timeout_seconds),
            require_identifier_column: config.pipeline.require_identifier_column,
            feed_options: FeedOptions {
                has_header: config.pipeline.feed_has_header,
                ..FeedOptions::default()
            },
        }
    }
}

#[derive(Clone)]
pub struct ShopPipeline {
    fetcher: Arc<dyn ResourceFetcher>,
    descriptors: Arc<ResourceCache>,
    feeds: Arc<ResourceCache>,
    normalizer: FeedNormalizer,
    settings: PipelineSettings,
}

impl ShopPipeline {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        descriptors: Arc<ResourceCache>,
        feeds: Arc<ResourceCache>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            descriptors,
            feeds,
            normalizer: FeedNormalizer::new(settings.feed_options.clone()),
            settings,
        }
    }

    /// Process one shop.
    ///
    /// The only error is [`CacheError::Storage`]; everything else is recorded
    /// as a [`ShopFailure`] on the returned report.
    pub async fn process(&self, task: ShopTask) -> Result<ShopReport, CacheError> {
        let report = ShopReport::new(&task);
        let descriptor_url = task.descriptor_ref.as_str().to_string();

        let raw = match self.fetch(&self.descriptors, &descriptor_url).await {
            Ok(raw) => raw,
            Err(CacheError::Fetch(e)) => {
                return Ok(fail(report, ShopFailure::transport(&descriptor_url, &e)));
            }
            Err(storage) => return Err(storage),
        };

        let info = ShopInfo::new(task, raw);
        let descriptor = match info.descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                let failure = ShopFailure::new(FailureKind::Parse, &descriptor_url, e.to_string());
                return Ok(fail(report, failure));
            }
        };
        let report = report.with_descriptor(descriptor);

        if self.settings.require_identifier_column && !descriptor.has_identifier_column() {
            let failure = ShopFailure::new(
                FailureKind::NoIdentifierColumn,
                &descriptor_url,
                "descriptor declares no EAN column",
            );
            return Ok(fail(report, failure));
        }

        let Some(feed_url) = descriptor.feed_url.as_deref() else {
            let failure =
                ShopFailure::new(FailureKind::MissingFeed, &descriptor_url, "descriptor declares no feed URL");
            return Ok(fail(report, failure));
        };

        let feed = match self.fetch(&self.feeds, feed_url).await {
            Ok(feed) => feed,
            Err(CacheError::Fetch(e)) => return Ok(fail(report, ShopFailure::transport(feed_url, &e))),
            Err(storage) => return Err(storage),
        };

        match self.normalizer.normalize(&feed, descriptor) {
            Ok(normalized) => {
                info!(
                    shop_id = %info.shop_id,
                    "✅ {} products from {} ({} rows dropped)",
                    normalized.products.len(),
                    descriptor.name.as_deref().unwrap_or(feed_url),
                    normalized.rows_dropped
                );
                Ok(ShopReport {
                    products: normalized.products,
                    rows_dropped: normalized.rows_dropped,
                    ..report
                })
            }
            Err(e) => Ok(fail(report, ShopFailure::normalize(feed_url, &e))),
        }
    }

    async fn fetch(&self, cache: &ResourceCache, url: &str) -> Result<Vec<u8>, CacheError> {
        debug!("Fetching {}", url);
        cache
            .fetch_cached(url, |key| async move {
                fetch_with_timeout(self.fetcher.as_ref(), &key, self.settings.fetch_timeout).await
            })
            .await
    }
}

fn fail(report: ShopReport, failure: ShopFailure) -> ShopReport {
    warn!(
        shop_id = %report.shop_id,
        resource = %failure.resource,
        kind = ?failure.kind,
        "Shop skipped: {}", failure.message
    );
    report.failed(failure)
}
