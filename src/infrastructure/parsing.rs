//! Parsers for the three document kinds the harvester touches: listing HTML,
//! `shopinfo.xml` descriptors and tabular product feeds.

pub mod descriptor_parser;
pub mod feed_normalizer;
pub mod listing_parser;

// Re-export public types
pub use crate::infrastructure::parsing_error::{NormalizeError, ParsingError, ParsingResult};
pub use descriptor_parser::parse_descriptor;
pub use feed_normalizer::{normalize_feed, FeedNormalizer, FeedOptions, NormalizedFeed};
pub use listing_parser::extract_descriptor_refs;
