//! Listing pagination and descriptor references

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default listing endpoint of the shop directory.
pub const DEFAULT_LISTING_BASE: &str = "http://elektronischer-markt.de/nav";

/// File name every shop publishes its descriptor under.
pub const DESCRIPTOR_FILE_NAME: &str = "shopinfo.xml";

/// One page of the shop listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingPage {
    pub page: u32,
    pub page_size: u32,
}

impl ListingPage {
    pub const fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Request URL for this page against `base`.
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}?page={}&blocksize={}&dest=search.shoplist",
            base, self.page, self.page_size
        )
    }
}

/// Number of listing pages needed to cover `shop_count` shops.
///
/// Always one more than the number of full pages, matching how the directory
/// paginates (a trailing partial or empty page is requested too). `None` for a
/// zero page size or a page count that does not fit in `u32`.
pub const fn page_count(shop_count: u32, page_size: u32) -> Option<u32> {
    match shop_count.checked_div(page_size) {
        Some(full_pages) => full_pages.checked_add(1),
        None => None,
    }
}

/// URL of a single shop's descriptor. Not deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorRef(pub String);

impl DescriptorRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DescriptorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DescriptorRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_is_deterministic() {
        let page = ListingPage::new(3, 50);
        assert_eq!(
            page.url(DEFAULT_LISTING_BASE),
            "http://elektronischer-markt.de/nav?page=3&blocksize=50&dest=search.shoplist"
        );
    }

    #[test]
    fn page_count_adds_trailing_page() {
        assert_eq!(page_count(4633, 50), Some(93));
        assert_eq!(page_count(100, 50), Some(3));
        assert_eq!(page_count(0, 50), Some(1));
    }

    #[test]
    fn page_count_rejects_unpageable_input() {
        assert_eq!(page_count(10, 0), None);
        assert_eq!(page_count(u32::MAX, 1), None);
        assert_eq!(page_count(u32::MAX, 2), Some(u32::MAX / 2 + 1));
    }
}
