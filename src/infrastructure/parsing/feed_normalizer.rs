//! Tabular feed normalization
//!
//! Turns a shop's raw feed into [`CanonicalProduct`] rows using the column
//! semantics declared in its descriptor. Decoding falls back to windows-1252
//! (what shops mean by "latin1" in practice), headers are renamed through the
//! descriptor's `columnName -> type` mapping, and rows without a valid EAN are
//! dropped.

use std::borrow::Cow;
use std::collections::HashMap;

use csv::{ReaderBuilder, Terminator};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use crate::domain::ean;
use crate::domain::product::{CanonicalField, CanonicalProduct};
use crate::domain::shop_descriptor::ShopDescriptor;
use crate::infrastructure::parsing_error::NormalizeError;

/// Feeds populating fewer canonical fields than this are treated as noise
/// (typically a wrong delimiter collapsing the header into one cell, or a
/// feed carrying nothing but identifiers).
pub const MIN_CANONICAL_FIELDS: usize = 2;

const DEFAULT_DELIMITER: &str = ",";

#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Treat the first record as a header row.
    pub has_header: bool,
    /// Canonical fields the feed must populate from its own columns.
    pub min_canonical_fields: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            min_canonical_fields: MIN_CANONICAL_FIELDS,
        }
    }
}

/// Result of normalizing one feed.
#[derive(Debug, Clone, Default)]
pub struct NormalizedFeed {
    pub products: Vec<CanonicalProduct>,
    /// Data records read from the feed (header excluded).
    pub rows_read: usize,
    /// Records dropped because their EAN did not validate.
    pub rows_dropped: usize,
    /// Encoding the feed was finally decoded with.
    pub encoding: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct FeedNormalizer {
    options: FeedOptions,
}

impl FeedNormalizer {
    pub const fn new(options: FeedOptions) -> Self {
        Self { options }
    }

    pub fn normalize(
        &self,
        raw: &[u8],
        descriptor: &ShopDescriptor,
    ) -> Result<NormalizedFeed, NormalizeError> {
        let (text, encoding) = decode_feed(raw, descriptor.encoding.as_deref())?;

        let delimiter = descriptor
            .delimiter
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DELIMITER);
        let terminator = terminator_for(descriptor.line_end.as_deref());
        let mut records = split_records(&text, delimiter, terminator);

        let column_names = if self.options.has_header && !records.is_empty() {
            let header = records.remove(0);
            renamed_header(&header, descriptor)
        } else {
            let width = records.iter().map(Vec::len).max().unwrap_or(0);
            (0..width)
                .map(|column| {
                    descriptor
                        .mapping_for_column(column)
                        .map(|mapping| mapping.kind.clone())
                        .unwrap_or_default()
                })
                .collect()
        };

        let positions = canonical_positions(&column_names);
        if positions.len() < self.options.min_canonical_fields {
            return Err(NormalizeError::Shape {
                fields: positions.len(),
                required: self.options.min_canonical_fields,
            });
        }

        let rows_read = records.len();
        let products: Vec<CanonicalProduct> = records
            .iter()
            .filter_map(|record| to_canonical(record, &positions))
            .collect();
        let rows_dropped = rows_read - products.len();

        if rows_dropped > 0 {
            debug!("Dropped {} of {} rows without a valid EAN", rows_dropped, rows_read);
        }

        Ok(NormalizedFeed {
            products,
            rows_read,
            rows_dropped,
            encoding: encoding.name(),
        })
    }
}

/// Normalize with default options.
pub fn normalize_feed(
    raw: &[u8],
    descriptor: &ShopDescriptor,
) -> Result<Vec<CanonicalProduct>, NormalizeError> {
    FeedNormalizer::default()
        .normalize(raw, descriptor)
        .map(|feed| feed.products)
}

/// Strict decode with the declared encoding, then one windows-1252 attempt.
fn decode_feed(
    raw: &[u8],
    declared: Option<&str>,
) -> Result<(String, &'static Encoding), NormalizeError> {
    let (body, bom_encoding) = match Encoding::for_bom(raw) {
        Some((encoding, bom_len)) => (&raw[bom_len..], Some(encoding)),
        None => (raw, None),
    };

    let primary = match declared {
        Some(label) => Encoding::for_label(label.trim().as_bytes()),
        None => Some(bom_encoding.unwrap_or(UTF_8)),
    };

    if let Some(encoding) = primary {
        if let Some(text) = strict_decode(encoding, body) {
            return Ok((text, encoding));
        }
    } else {
        debug!("Unknown feed encoding label {:?}", declared);
    }

    match strict_decode(WINDOWS_1252, body) {
        Some(text) => {
            warn!(
                "Feed not decodable as {}, fell back to {}",
                declared.unwrap_or("utf-8"),
                WINDOWS_1252.name()
            );
            Ok((text, WINDOWS_1252))
        }
        None => Err(NormalizeError::Decode {
            declared: declared.map(str::to_string),
        }),
    }
}

fn strict_decode(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

/// Record terminator from the descriptor's `lineend` attribute.
///
/// Only spaces are trimmed: the attribute may itself be a raw `\n` or `\r`.
pub fn terminator_for(line_end: Option<&str>) -> Terminator {
    let Some(line_end) = line_end else {
        return Terminator::CRLF;
    };

    match line_end.trim_matches(' ') {
        "\n" | "\\n" | "[lf]" | "lf" | "LF" => Terminator::Any(b'\n'),
        "\r" | "\\r" | "[cr]" | "cr" | "CR" => Terminator::Any(b'\r'),
        other if other.len() == 1 && other.is_ascii() => Terminator::Any(other.as_bytes()[0]),
        _ => Terminator::CRLF,
    }
}

fn split_records(text: &str, delimiter: &str, terminator: Terminator) -> Vec<Vec<String>> {
    if delimiter.len() == 1 {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter.as_bytes()[0])
            .terminator(terminator)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        reader
            .records()
            .filter_map(|record| match record {
                Ok(record) => Some(record.iter().map(str::to_string).collect()),
                Err(e) => {
                    debug!("Skipping bad feed record: {}", e);
                    None
                }
            })
            .collect()
    } else {
        // Multi-character delimiters are outside what the csv reader supports.
        let lines: Vec<&str> = match terminator {
            Terminator::Any(byte) => text.split(char::from(byte)).collect(),
            _ => text.lines().collect(),
        };
        lines
            .into_iter()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(|line| line.split(delimiter).map(str::to_string).collect())
            .collect()
    }
}

fn renamed_header(header: &[String], descriptor: &ShopDescriptor) -> Vec<String> {
    let lookup: HashMap<&str, &str> = descriptor.column_lookup().collect();
    header
        .iter()
        .map(|name| {
            let cleaned = clean_header(name);
            lookup
                .get(cleaned.as_str())
                .map_or(cleaned.clone(), |kind| (*kind).to_string())
        })
        .collect()
}

fn clean_header(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '\'' && *c != '"')
        .collect::<String>()
        .trim()
        .to_string()
}

/// First column position for every canonical field present in the feed.
fn canonical_positions(column_names: &[String]) -> Vec<(CanonicalField, usize)> {
    CanonicalField::ALL
        .into_iter()
        .filter_map(|field| {
            column_names
                .iter()
                .position(|name| name == field.token())
                .map(|index| (field, index))
        })
        .collect()
}

fn to_canonical(record: &[String], positions: &[(CanonicalField, usize)]) -> Option<CanonicalProduct> {
    let mut product = CanonicalProduct::default();
    for &(field, index) in positions {
        let value = record
            .get(index)
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .map(str::to_string);
        product.set(field, value);
    }

    product.ean = product.ean.as_deref().and_then(ean::normalize);
    product.ean.is_some().then_some(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shop_descriptor::{resolve_delimiter, ColumnMapping};
    use rstest::rstest;

    fn tab_descriptor() -> ShopDescriptor {
        ShopDescriptor {
            delimiter: Some(resolve_delimiter("[tab]")),
            mappings: vec![
                ColumnMapping::new(0, "EAN", Some("ean".into())),
                ColumnMapping::new(1, "Name", Some("name".into())),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn keeps_only_rows_with_valid_ean() {
        let feed = "EAN\tName\n4006381333931\tWidget\n4006381333932\tGadget\n";
        let products = normalize_feed(feed.as_bytes(), &tab_descriptor()).unwrap();

        assert_eq!(products.len(), 1);
        let product = &products[0];
        assert_eq!(product.ean.as_deref(), Some("4006381333931"));
        assert_eq!(product.name.as_deref(), Some("Widget"));
        assert_eq!(product.private_id, None);
        assert_eq!(product.short_description, None);
        assert_eq!(product.brand, None);
        assert_eq!(product.price, None);
        assert_eq!(product.product_type, None);
    }

    #[test]
    fn reports_row_statistics() {
        let feed = "EAN\tName\n4006381333931\tWidget\n4006381333932\tGadget\nabc\tJunk\n";
        let result = FeedNormalizer::default()
            .normalize(feed.as_bytes(), &tab_descriptor())
            .unwrap();

        assert_eq!(result.rows_read, 3);
        assert_eq!(result.rows_dropped, 2);
        assert_eq!(result.encoding, "UTF-8");
    }

    #[test]
    fn normalizes_float_like_eans() {
        let feed = "EAN\tName\n4006381333931.0\tWidget\n";
        let products = normalize_feed(feed.as_bytes(), &tab_descriptor()).unwrap();
        assert_eq!(products[0].ean.as_deref(), Some("4006381333931"));
    }

    #[test]
    fn falls_back_to_windows_1252() {
        let feed = b"EAN;Name;Marke\n4006381333931;K\xfchlschrank;Acme\n";
        let descriptor = ShopDescriptor {
            delimiter: Some(";".into()),
            mappings: vec![
                ColumnMapping::new(0, "EAN", Some("ean".into())),
                ColumnMapping::new(1, "Name", Some("name".into())),
                ColumnMapping::new(2, "Marke", Some("brand".into())),
            ],
            ..Default::default()
        };

        let result = FeedNormalizer::default().normalize(feed, &descriptor).unwrap();
        assert_eq!(result.encoding, "windows-1252");
        assert_eq!(result.products[0].name.as_deref(), Some("Kühlschrank"));
        assert_eq!(result.products[0].brand.as_deref(), Some("Acme"));
    }

    #[test]
    fn honours_declared_encoding() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("ean,name,brand\n4006381333931,Gerät,Acme\n");
        let descriptor = ShopDescriptor {
            encoding: Some("iso-8859-1".into()),
            ..Default::default()
        };
        let result = FeedNormalizer::default().normalize(&bytes, &descriptor).unwrap();
        assert_eq!(result.products[0].name.as_deref(), Some("Gerät"));
    }

    #[test]
    fn unknown_encoding_label_falls_back() {
        let descriptor = ShopDescriptor {
            encoding: Some("klingon-8".into()),
            ..Default::default()
        };
        let result = FeedNormalizer::default()
            .normalize(b"ean,name,brand\n4006381333931,A,B\n", &descriptor)
            .unwrap();
        assert_eq!(result.encoding, "windows-1252");
        assert_eq!(result.products.len(), 1);
    }

    #[test]
    fn rejects_feed_split_with_wrong_delimiter() {
        // Every row collapses into one cell that maps to nothing.
        let err = normalize_feed(b"EAN;Name;Price\n4006381333931;A;1\n", &tab_descriptor()).unwrap_err();
        assert_eq!(err, NormalizeError::Shape { fields: 0, required: MIN_CANONICAL_FIELDS });
    }

    #[test]
    fn rejects_identifier_only_feed() {
        let err = normalize_feed(b"EAN\tLager\n4006381333931\t5\n", &tab_descriptor()).unwrap_err();
        assert_eq!(err, NormalizeError::Shape { fields: 1, required: MIN_CANONICAL_FIELDS });
    }

    #[test]
    fn extra_unmapped_columns_are_ignored() {
        let feed = "EAN\tName\tLager\n4006381333931\tWidget\t5\n";
        let products = normalize_feed(feed.as_bytes(), &tab_descriptor()).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name.as_deref(), Some("Widget"));
    }

    #[test]
    fn unmapped_headers_keep_their_name() {
        // Shops that already use canonical names need no mapping.
        let feed = "privateid,name,shortdescription,brand,ean,price,type\n17,Lamp,Bright,Acme,4006381333931,\"12,99\",light\n";
        let products = normalize_feed(feed.as_bytes(), &ShopDescriptor::default()).unwrap();

        let product = &products[0];
        assert_eq!(product.private_id.as_deref(), Some("17"));
        assert_eq!(product.short_description.as_deref(), Some("Bright"));
        assert_eq!(product.price.as_deref(), Some("12,99"));
        assert_eq!(product.price_value(), Some(12.99));
        assert_eq!(product.product_type.as_deref(), Some("light"));
    }

    #[test]
    fn strips_quotes_from_headers() {
        let feed = "'EAN'|'Name'|'Preis'\n4006381333931|Widget|9.99\n";
        let descriptor = ShopDescriptor {
            delimiter: Some("|".into()),
            mappings: vec![
                ColumnMapping::new(0, "EAN", Some("ean".into())),
                ColumnMapping::new(1, "Name", Some("name".into())),
                ColumnMapping::new(2, "Preis", Some("price".into())),
            ],
            ..Default::default()
        };
        let products = normalize_feed(feed.as_bytes(), &descriptor).unwrap();
        assert_eq!(products[0].price.as_deref(), Some("9.99"));
    }

    #[test]
    fn headerless_feed_uses_column_positions() {
        let normalizer = FeedNormalizer::new(FeedOptions {
            has_header: false,
            ..FeedOptions::default()
        });
        let descriptor = ShopDescriptor {
            delimiter: Some("\t".into()),
            mappings: vec![
                ColumnMapping::new(2, "EAN", Some("ean".into())),
                ColumnMapping::new(0, "Titel", Some("name".into())),
            ],
            ..Default::default()
        };
        let result = normalizer
            .normalize(b"Widget\t3\t4006381333931\n", &descriptor)
            .unwrap();

        assert_eq!(result.rows_read, 1);
        assert_eq!(result.products[0].name.as_deref(), Some("Widget"));
        assert_eq!(result.products[0].ean.as_deref(), Some("4006381333931"));
    }

    #[test]
    fn multi_character_delimiter() {
        let descriptor = ShopDescriptor {
            delimiter: Some("||".into()),
            ..Default::default()
        };
        let feed = "ean||name||brand\r\n4006381333931||Widget||Acme\r\n";
        let products = normalize_feed(feed.as_bytes(), &descriptor).unwrap();
        assert_eq!(products[0].brand.as_deref(), Some("Acme"));
    }

    #[test]
    fn custom_record_terminator() {
        let descriptor = ShopDescriptor {
            delimiter: Some(";".into()),
            line_end: Some("~".into()),
            ..Default::default()
        };
        let feed = "ean;name;brand~4006381333931;Widget;Acme~";
        let products = normalize_feed(feed.as_bytes(), &descriptor).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name.as_deref(), Some("Widget"));
    }

    #[test]
    fn empty_feed_is_rejected_as_shape() {
        let err = normalize_feed(b"", &tab_descriptor()).unwrap_err();
        assert!(matches!(err, NormalizeError::Shape { fields: 0, .. }));
    }

    #[test]
    fn feed_without_ean_column_yields_nothing() {
        let products = normalize_feed(b"name,brand,price\nLamp,Acme,1\n", &ShopDescriptor::default()).unwrap();
        assert!(products.is_empty());
    }

    #[rstest]
    #[case(Some("[lf]"), Some(b'\n'))]
    #[case(Some("\n"), Some(b'\n'))]
    #[case(Some(" \n "), Some(b'\n'))]
    #[case(Some("\r"), Some(b'\r'))]
    #[case(Some("[cr]"), Some(b'\r'))]
    #[case(Some("~"), Some(b'~'))]
    #[case(Some("[crlf]"), None)]
    #[case(None, None)]
    fn terminator_mapping(#[case] line_end: Option<&str>, #[case] expected: Option<u8>) {
        let terminator = terminator_for(line_end);
        match expected {
            Some(byte) => assert!(
                matches!(terminator, Terminator::Any(b) if b == byte),
                "expected Any({byte}), got {terminator:?}"
            ),
            None => assert!(matches!(terminator, Terminator::CRLF), "got {terminator:?}"),
        }
    }

    #[test]
    fn raw_newline_terminator_splits_records() {
        let descriptor = ShopDescriptor {
            line_end: Some("\n".into()),
            ..tab_descriptor()
        };
        let feed = "EAN\tName\n4006381333931\tWidget\n";
        let products = normalize_feed(feed.as_bytes(), &descriptor).unwrap();
        assert_eq!(products.len(), 1);
    }
}
