//! Structured form of a shop's `shopinfo.xml` descriptor
//!
//! Descriptors are written by hand or by a dozen different shop systems, so
//! almost every field is optional. Absence is data here, not an error.

use serde::{Deserialize, Serialize};

/// Literal some descriptors use instead of an actual tab character.
pub const TAB_TOKEN: &str = "[tab]";

/// Column of the tabular feed and what it means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Zero-based position in the feed.
    pub column: usize,
    /// Header name as declared by the shop.
    pub name: String,
    /// Semantic type; falls back to `name` when the descriptor omits it.
    pub kind: String,
}

impl ColumnMapping {
    pub fn new(column: usize, name: impl Into<String>, kind: Option<String>) -> Self {
        let name = name.into();
        let kind = kind.unwrap_or_else(|| name.clone());
        Self { column, name, kind }
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == "ean" || self.name.eq_ignore_ascii_case("ean")
    }
}

/// Category entry from the descriptor's category breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryItem {
    pub name: Option<String>,
    pub mapping: Option<String>,
    pub product_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopDescriptor {
    pub name: Option<String>,
    pub shop_url: Option<String>,
    /// Encoding declared on the first line of the document.
    pub encoding: Option<String>,
    /// Column mappings in document order.
    pub mappings: Vec<ColumnMapping>,
    pub feed_url: Option<String>,
    /// Field delimiter; `[tab]` is already resolved to `\t`.
    pub delimiter: Option<String>,
    pub line_end: Option<String>,
    pub total_product_count: Option<u64>,
    pub categories: Vec<CategoryItem>,
}

impl ShopDescriptor {
    /// Whether the feed carries an EAN column worth fetching for.
    pub fn has_identifier_column(&self) -> bool {
        self.mappings.iter().any(ColumnMapping::is_identifier)
    }

    /// `columnName -> type` lookup used to rename feed headers.
    ///
    /// Later mappings win when a shop declares the same header twice.
    pub fn column_lookup(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mappings
            .iter()
            .map(|mapping| (mapping.name.as_str(), mapping.kind.as_str()))
    }

    /// Mapping for a given feed position, for headerless feeds.
    pub fn mapping_for_column(&self, column: usize) -> Option<&ColumnMapping> {
        self.mappings.iter().rev().find(|mapping| mapping.column == column)
    }
}

/// Resolve the delimiter attribute of `SpecialCharacters`.
pub fn resolve_delimiter(raw: &str) -> String {
    if raw == TAB_TOKEN {
        "\t".to_string()
    } else {
        raw.to_string()
    }
}
