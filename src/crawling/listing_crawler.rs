//! # Listing Crawler
//!
//! Walks the paginated shop directory and yields one [`DescriptorRef`] per
//! shop link found, page by page.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crawling::fetch_with_timeout;
use crate::crawling::worker_pool::{JobOutcome, WorkerPool};
use crate::domain::listing::{page_count, DescriptorRef, ListingPage};
use crate::domain::services::ResourceFetcher;
use crate::infrastructure::parsing::listing_parser::extract_descriptor_refs;
use crate::infrastructure::resource_cache::{CacheError, ResourceCache};

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("cannot page {shop_count} shops in pages of {page_size}")]
    InvalidPaging { shop_count: u32, page_size: u32 },

    /// Listing cache storage failed; fatal for the run.
    #[error(transparent)]
    Storage(#[from] CacheError),
}

/// Fetches listing pages through the listing cache.
#[derive(Clone)]
pub struct ListingCrawler {
    fetcher: Arc<dyn ResourceFetcher>,
    cache: Arc<ResourceCache>,
    base_url: String,
    fetch_timeout: Duration,
}

impl ListingCrawler {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        cache: Arc<ResourceCache>,
        base_url: impl Into<String>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            cache,
            base_url: base_url.into(),
            fetch_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lazily enumerate descriptor refs for `shop_count` shops.
    pub fn discover_descriptor_refs(
        &self,
        shop_count: u32,
        page_size: u32,
    ) -> Result<DescriptorRefStream, CrawlError> {
        let pages = checked_page_count(shop_count, page_size)?;
        info!("📄 Listing has {} pages ({} shops, {} per page)", pages, shop_count, page_size);

        Ok(DescriptorRefStream {
            crawler: self.clone(),
            page_size,
            next_page: 1,
            last_page: pages,
            buffered: VecDeque::new(),
        })
    }

    /// Fetch every listing page through `pool` and concatenate the refs.
    ///
    /// Page order is not preserved. Failed pages are logged and skipped.
    pub async fn discover_parallel(
        &self,
        pool: &WorkerPool,
        shop_count: u32,
        page_size: u32,
    ) -> Result<Vec<DescriptorRef>, CrawlError> {
        let pages = (1..=checked_page_count(shop_count, page_size)?).map(|page| ListingPage::new(page, page_size));
        let crawler = self.clone();
        let outcomes = pool
            .run(pages, move |page| {
                let crawler = crawler.clone();
                async move { (page, crawler.fetch_page(page).await) }
            })
            .await;

        let mut refs = Vec::new();
        for outcome in outcomes {
            match outcome {
                JobOutcome::Completed((_, Ok(page_refs))) => refs.extend(page_refs),
                JobOutcome::Completed((_, Err(e))) if e.is_fatal() => return Err(e.into()),
                JobOutcome::Completed((page, Err(e))) => {
                    warn!(resource = %page.url(&self.base_url), "Listing page {} skipped: {}", page.page, e);
                }
                JobOutcome::Panicked { message } => warn!("Listing page job panicked: {}", message),
                JobOutcome::Cancelled => {}
            }
        }

        info!("🔎 Discovered {} descriptor refs", refs.len());
        Ok(refs)
    }

    /// Descriptor refs on one listing page, in document order.
    pub async fn fetch_page(&self, page: ListingPage) -> Result<Vec<DescriptorRef>, CacheError> {
        let url = page.url(&self.base_url);
        let body = self
            .cache
            .fetch_cached(&url, |key| async move {
                fetch_with_timeout(self.fetcher.as_ref(), &key, self.fetch_timeout).await
            })
            .await?;

        let refs = extract_descriptor_refs(&String::from_utf8_lossy(&body));
        debug!("Listing page {}: {} descriptor refs", page.page, refs.len());
        Ok(refs)
    }
}

fn checked_page_count(shop_count: u32, page_size: u32) -> Result<u32, CrawlError> {
    page_count(shop_count, page_size).ok_or(CrawlError::InvalidPaging { shop_count, page_size })
}

/// Pull-based, finite sequence of descriptor refs.
///
/// Pages are fetched one at a time as the buffer runs dry. A page whose fetch
/// fails is logged and skipped; only cache storage failures end the stream
/// with an error.
pub struct DescriptorRefStream {
    crawler: ListingCrawler,
    page_size: u32,
    next_page: u32,
    last_page: u32,
    buffered: VecDeque<DescriptorRef>,
}

impl DescriptorRefStream {
    /// Whether anything may still come out of [`Self::next`]. Remaining pages
    /// can turn out empty, so `true` does not guarantee another ref.
    pub fn has_more(&self) -> bool {
        !self.buffered.is_empty() || self.next_page <= self.last_page
    }

    /// Total number of listing pages this stream covers.
    pub const fn page_count(&self) -> u32 {
        self.last_page
    }

    pub async fn next(&mut self) -> Result<Option<DescriptorRef>, CacheError> {
        loop {
            if let Some(descriptor_ref) = self.buffered.pop_front() {
                return Ok(Some(descriptor_ref));
            }
            if self.next_page > self.last_page {
                return Ok(None);
            }

            let page = ListingPage::new(self.next_page, self.page_size);
            self.next_page += 1;

            match self.crawler.fetch_page(page).await {
                Ok(refs) => self.buffered.extend(refs),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        resource = %page.url(self.crawler.base_url()),
                        "Listing page {} skipped: {}", page.page, e
                    );
                }
            }
        }
    }

    /// Drain the stream.
    pub async fn collect_all(mut self) -> Result<Vec<DescriptorRef>, CacheError> {
        let mut refs = Vec::new();
        while let Some(descriptor_ref) = self.next().await? {
            refs.push(descriptor_ref);
        }
        Ok(refs)
    }
}
