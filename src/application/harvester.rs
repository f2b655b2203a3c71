//! Harvest orchestration
//!
//! Wires listing discovery, the worker pool and the shop pipeline into one
//! run over the whole shop directory.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::crawling::listing_crawler::{CrawlError, ListingCrawler};
use crate::crawling::shop_pipeline::{PipelineSettings, ShopPipeline};
use crate::crawling::tasks::{FailureKind, ShopReport, ShopTask};
use crate::crawling::worker_pool::{JobOutcome, WorkerPool};
use crate::domain::listing::DescriptorRef;
use crate::domain::product::CanonicalProduct;
use crate::domain::services::ResourceFetcher;
use crate::domain::value_objects::{ShopId, ShopIdAllocator};
use crate::infrastructure::config::{AppConfig, ConfigError};
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};
use crate::infrastructure::resource_cache::{CacheError, ResourceCache};

const LISTINGS_DIR: &str = "listings";
const DESCRIPTORS_DIR: &str = "descriptors";
const FEEDS_DIR: &str = "feeds";

#[derive(Error, Debug)]
pub enum HarvestError {
    /// Cache storage is unusable; the run was aborted.
    #[error("cache storage failure: {0}")]
    Storage(#[source] CacheError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<ConfigError> for HarvestError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<CrawlError> for HarvestError {
    fn from(err: CrawlError) -> Self {
        match err {
            paging @ CrawlError::InvalidPaging { .. } => Self::Config(paging.to_string()),
            CrawlError::Storage(cache) => Self::Storage(cache),
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestSummary {
    pub reports: Vec<ShopReport>,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
    /// Shop jobs that panicked; they have no report
    pub panicked: usize,
    /// Shop jobs aborted by shutdown
    pub cancelled: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl HarvestSummary {
    /// Every normalized product with the shop it came from.
    pub fn products(&self) -> impl Iterator<Item = (ShopId, &CanonicalProduct)> {
        self.reports
            .iter()
            .flat_map(|report| report.products.iter().map(move |product| (report.shop_id, product)))
    }

    pub fn product_count(&self) -> usize {
        self.reports.iter().map(|report| report.products.len()).sum()
    }

    pub fn shops_succeeded(&self) -> usize {
        self.reports.iter().filter(|report| report.is_success()).count()
    }

    pub fn shops_failed(&self) -> usize {
        self.reports.len() - self.shops_succeeded()
    }

    fn record(&mut self, report: ShopReport) {
        if let Some(kind) = report.failure_kind() {
            *self.failures_by_kind.entry(kind).or_default() += 1;
        }
        self.reports.push(report);
    }
}

/// Runs the full pipeline for one configuration.
pub struct Harvester {
    config: AppConfig,
    fetcher: Arc<dyn ResourceFetcher>,
    id_allocator: Arc<ShopIdAllocator>,
    cancellation_token: CancellationToken,
}

impl Harvester {
    pub fn new(config: AppConfig, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            config,
            fetcher,
            id_allocator: Arc::new(ShopIdAllocator::new()),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Harvester backed by the production HTTP client.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let client = HttpClient::new(HttpClientConfig::from(&config.http))?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Cancel to stop the run. Jobs in flight are aborted and counted as cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn run(&self) -> Result<HarvestSummary, HarvestError> {
        self.config.validate()?;
        let started = Instant::now();

        let listings = self.open_cache(LISTINGS_DIR).await?;
        let descriptors = self.open_cache(DESCRIPTORS_DIR).await?;
        let feeds = self.open_cache(FEEDS_DIR).await?;

        let crawler = ListingCrawler::new(
            Arc::clone(&self.fetcher),
            listings,
            self.config.listing.base_url.clone(),
            Duration::from_secs(self.config.workers.fetch_timeout_seconds),
        );
        let refs = self.discover(&crawler).await?;
        info!("🔎 {} shops to process", refs.len());

        let tasks: Vec<ShopTask> = refs
            .into_iter()
            .map(|descriptor_ref| ShopTask::new(self.id_allocator.allocate(), descriptor_ref))
            .collect();

        let pipeline = ShopPipeline::new(
            Arc::clone(&self.fetcher),
            descriptors,
            feeds,
            PipelineSettings::from(&self.config),
        );
        let pool = self.pool();
        let abort = pool.cancellation_token();

        let outcomes = pool
            .run(tasks, move |task| {
                let pipeline = pipeline.clone();
                let abort = abort.clone();
                async move {
                    let result = pipeline.process(task).await;
                    if result.is_err() {
                        abort.cancel();
                    }
                    result
                }
            })
            .await;

        let mut summary = HarvestSummary::default();
        let mut storage_failure = None;
        for outcome in outcomes {
            match outcome {
                JobOutcome::Completed(Ok(report)) => summary.record(report),
                JobOutcome::Completed(Err(e)) => {
                    error!("❌ Cache storage failed, aborting run: {}", e);
                    storage_failure.get_or_insert(e);
                }
                JobOutcome::Panicked { message } => {
                    error!("Shop job panicked: {}", message);
                    summary.panicked += 1;
                }
                JobOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        if let Some(e) = storage_failure {
            return Err(HarvestError::Storage(e));
        }

        summary.elapsed = started.elapsed();
        info!(
            "🏁 Harvest finished in {:.1}s: {} shops ok, {} failed, {} products",
            summary.elapsed.as_secs_f64(),
            summary.shops_succeeded(),
            summary.shops_failed(),
            summary.product_count()
        );
        for (kind, count) in &summary.failures_by_kind {
            info!(kind = %kind, "{} shops failed", count);
        }
        Ok(summary)
    }

    async fn discover(&self, crawler: &ListingCrawler) -> Result<Vec<DescriptorRef>, HarvestError> {
        let listing = &self.config.listing;
        if listing.parallel_discovery {
            return Ok(crawler
                .discover_parallel(&self.pool(), listing.shop_count, listing.page_size)
                .await?);
        }

        let mut stream = crawler.discover_descriptor_refs(listing.shop_count, listing.page_size)?;
        let mut refs = Vec::new();
        while stream.has_more() {
            if self.cancellation_token.is_cancelled() {
                warn!("🛑 Discovery cancelled after {} refs", refs.len());
                break;
            }
            match stream.next().await.map_err(HarvestError::Storage)? {
                Some(descriptor_ref) => refs.push(descriptor_ref),
                None => break,
            }
        }
        Ok(refs)
    }

    async fn open_cache(&self, name: &str) -> Result<Arc<ResourceCache>, HarvestError> {
        let cache = ResourceCache::open(self.config.cache.dir.join(name))
            .await
            .map_err(HarvestError::Storage)?;
        Ok(Arc::new(cache))
    }

    fn pool(&self) -> WorkerPool {
        WorkerPool::with_cancellation(self.config.workers.max_concurrent, self.cancellation_token.child_token())
    }
}
