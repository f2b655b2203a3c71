//! `shopinfo.xml` interpretation
//!
//! Only an unparsable document is an error. Every lookup beneath a present
//! root yields `None` (or an empty list) when its node is missing, because
//! real descriptors leave out whatever their shop system did not know about.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use tracing::debug;

use crate::domain::shop_descriptor::{resolve_delimiter, CategoryItem, ColumnMapping, ShopDescriptor};
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

static ENCODING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"encoding="(?P<encoding>.*?)""#).expect("encoding pattern is valid"));

/// Parse raw descriptor bytes.
pub fn parse_descriptor(bytes: &[u8]) -> ParsingResult<ShopDescriptor> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ParsingError::EmptyDocument);
    }

    let encoding = detect_encoding(bytes);
    let text = decode_document(bytes, encoding.as_deref());

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(&text, options)
        .map_err(|e| ParsingError::malformed(&e))?;
    let root = document.root_element();

    let tabular = root.descendants().skip(1).find(|node| is_element(node, "Tabular"));
    let csv = tabular.and_then(|node| child(node, "CSV"));
    let special_characters = csv.and_then(|node| child(node, "SpecialCharacters"));
    let categories = root
        .descendants()
        .skip(1)
        .filter(|node| is_element(node, "Categories"));

    let mut total_product_count = None;
    let mut category_items = Vec::new();
    for section in categories {
        if total_product_count.is_none() {
            total_product_count = child(section, "TotalProductCount")
                .and_then(text_of)
                .and_then(|text| text.parse().ok());
        }
        category_items.extend(children(section, "Item").map(parse_category));
    }

    Ok(ShopDescriptor {
        name: child(root, "Name").and_then(text_of),
        shop_url: child(root, "Url").and_then(text_of),
        encoding,
        mappings: tabular.map(parse_mappings).unwrap_or_default(),
        feed_url: csv.and_then(|node| child(node, "Url")).and_then(text_of),
        delimiter: special_characters
            .and_then(|node| node.attribute("delimiter"))
            .map(resolve_delimiter),
        line_end: special_characters
            .and_then(|node| node.attribute("lineend"))
            .map(str::to_string),
        total_product_count,
        categories: category_items,
    })
}

/// Encoding declared on the first line, e.g. `<?xml ... encoding="ISO-8859-1"?>`.
pub fn detect_encoding(bytes: &[u8]) -> Option<String> {
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    ENCODING_PATTERN
        .captures(first_line)
        .and_then(|captures| captures.name("encoding"))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

/// Decode with the declared encoding, UTF-8 when unknown. Lossy on purpose:
/// a single bad byte in a shop name should not cost us the whole descriptor.
fn decode_document(bytes: &[u8], declared: Option<&str>) -> String {
    let encoding = declared
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!("Descriptor contained bytes invalid in {}", encoding.name());
    }
    text.into_owned()
}

fn parse_mappings(tabular: Node<'_, '_>) -> Vec<ColumnMapping> {
    let Some(section) = child(tabular, "Mappings") else {
        return Vec::new();
    };

    section
        .children()
        .filter(Node::is_element)
        .filter_map(|mapping| {
            let column = mapping.attribute("column").and_then(|c| c.trim().parse().ok());
            let name = mapping.attribute("columnName");
            match (column, name) {
                (Some(column), Some(name)) => Some(ColumnMapping::new(
                    column,
                    name,
                    mapping.attribute("type").map(str::to_string),
                )),
                _ => {
                    debug!(
                        "Skipping mapping without usable column/columnName: {:?}",
                        mapping.attributes().map(|a| (a.name(), a.value())).collect::<Vec<_>>()
                    );
                    None
                }
            }
        })
        .collect()
}

fn parse_category(item: Node<'_, '_>) -> CategoryItem {
    CategoryItem {
        name: child(item, "Name").and_then(text_of),
        mapping: child(item, "Mapping").and_then(text_of),
        product_count: child(item, "ProductCount")
            .and_then(text_of)
            .and_then(|count| count.parse().ok()),
    }
}

fn is_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_element(n, name))
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| is_element(n, name))
}

fn text_of(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
