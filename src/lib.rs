//! shopinfo-harvester
//!
//! Discovers shops from a paginated directory, fetches each shop's
//! `shopinfo.xml` descriptor and product feed, and normalizes the feed into
//! canonical products with validated EANs. Every fetched resource is memoized
//! on disk.

pub mod application;
pub mod crawling;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

pub use application::{HarvestError, HarvestSummary, Harvester};
pub use domain::{CanonicalProduct, DescriptorRef, FetchError, ResourceFetcher, ShopDescriptor, ShopId};
pub use infrastructure::AppConfig;
