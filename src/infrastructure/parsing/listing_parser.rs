//! Descriptor URL extraction from shop listing pages
//!
//! The listing is HTML we do not control, so this is a line scan rather than a
//! DOM walk: lines with a "counter ... home" tracking anchor carry the shop's
//! home page as a URL-encoded `redirect=` parameter.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::domain::listing::{DescriptorRef, DESCRIPTOR_FILE_NAME};

static LINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"a.target.*counter.*home").expect("line pattern is valid"));

static REDIRECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"redirect=(?P<url>http.*)&amp;rid=2""#).expect("redirect pattern is valid")
});

/// All descriptor refs found in a listing document, in document order.
pub fn extract_descriptor_refs(listing: &str) -> Vec<DescriptorRef> {
    listing
        .lines()
        .map(str::trim_end)
        .filter(|line| LINE_PATTERN.is_match(line))
        .filter_map(descriptor_ref_from_line)
        .collect()
}

/// Decode the redirect target on `line` and point it at the shop's descriptor.
pub fn descriptor_ref_from_line(line: &str) -> Option<DescriptorRef> {
    let decoded = percent_decode_str(line).decode_utf8_lossy();
    let target = REDIRECT_PATTERN
        .captures(&decoded)
        .and_then(|captures| captures.name("url"))?
        .as_str();

    match descriptor_url(target) {
        Some(url) => Some(DescriptorRef::new(url)),
        None => {
            debug!("Ignoring unusable redirect target: {}", target);
            None
        }
    }
}

/// Replace the final path segment of `shop_url` with `shopinfo.xml`.
pub fn descriptor_url(shop_url: &str) -> Option<String> {
    let mut url = Url::parse(shop_url).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut segments = url.path_segments_mut().ok()?;
        segments.pop();
        segments.push(DESCRIPTOR_FILE_NAME);
    }
    Some(url.into())
}
