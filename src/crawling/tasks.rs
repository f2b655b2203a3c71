//! # Shop Task Definitions
//!
//! One shop is one unit of work: it enters as a [`ShopTask`] and leaves as a
//! [`ShopReport`], successful or carrying a [`ShopFailure`].

use std::fmt;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::listing::DescriptorRef;
use crate::domain::product::CanonicalProduct;
use crate::domain::services::FetchError;
use crate::domain::shop_descriptor::ShopDescriptor;
use crate::domain::value_objects::ShopId;
use crate::infrastructure::parsing::descriptor_parser::parse_descriptor;
use crate::infrastructure::parsing_error::{NormalizeError, ParsingResult};

/// A shop waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopTask {
    pub shop_id: ShopId,
    pub descriptor_ref: DescriptorRef,
}

impl ShopTask {
    pub const fn new(shop_id: ShopId, descriptor_ref: DescriptorRef) -> Self {
        Self { shop_id, descriptor_ref }
    }
}

/// Fetched descriptor of one shop, parsed on first access.
#[derive(Debug)]
pub struct ShopInfo {
    pub shop_id: ShopId,
    pub descriptor_ref: DescriptorRef,
    raw: Vec<u8>,
    descriptor: OnceCell<ShopDescriptor>,
}

impl ShopInfo {
    pub fn new(task: ShopTask, raw: Vec<u8>) -> Self {
        Self {
            shop_id: task.shop_id,
            descriptor_ref: task.descriptor_ref,
            raw,
            descriptor: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Parsed descriptor. A failed parse is not memoized.
    pub fn descriptor(&self) -> ParsingResult<&ShopDescriptor> {
        self.descriptor.get_or_try_init(|| parse_descriptor(&self.raw))
    }

    pub fn is_parsed(&self) -> bool {
        self.descriptor.get().is_some()
    }
}

/// Why a shop produced no products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Descriptor or feed could not be fetched
    Transport,
    /// Descriptor is not usable XML
    Parse,
    /// Feed bytes could not be decoded
    Decode,
    /// Feed populates too few canonical fields to be a real product table
    Shape,
    /// Descriptor declares no feed URL
    MissingFeed,
    /// Descriptor declares no EAN column
    NoIdentifierColumn,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Transport => "transport",
            Self::Parse => "parse",
            Self::Decode => "decode",
            Self::Shape => "shape",
            Self::MissingFeed => "missing_feed",
            Self::NoIdentifierColumn => "no_identifier_column",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} failure for {resource}: {message}")]
pub struct ShopFailure {
    pub kind: FailureKind,
    /// URL of the resource that failed
    pub resource: String,
    pub message: String,
}

impl ShopFailure {
    pub fn new(kind: FailureKind, resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn transport(resource: &str, error: &FetchError) -> Self {
        Self::new(FailureKind::Transport, resource, error.to_string())
    }

    pub fn normalize(resource: &str, error: &NormalizeError) -> Self {
        let kind = match error {
            NormalizeError::Decode { .. } => FailureKind::Decode,
            NormalizeError::Shape { .. } => FailureKind::Shape,
        };
        Self::new(kind, resource, error.to_string())
    }
}

/// Result of processing one shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopReport {
    pub shop_id: ShopId,
    pub descriptor_ref: DescriptorRef,
    pub shop_name: Option<String>,
    pub shop_url: Option<String>,
    /// Product count the descriptor claims, for comparison with what we got
    pub declared_product_count: Option<u64>,
    pub products: Vec<CanonicalProduct>,
    /// Feed rows dropped for an invalid EAN
    pub rows_dropped: usize,
    pub failure: Option<ShopFailure>,
}

impl ShopReport {
    pub fn new(task: &ShopTask) -> Self {
        Self {
            shop_id: task.shop_id,
            descriptor_ref: task.descriptor_ref.clone(),
            shop_name: None,
            shop_url: None,
            declared_product_count: None,
            products: Vec::new(),
            rows_dropped: 0,
            failure: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: &ShopDescriptor) -> Self {
        self.shop_name.clone_from(&descriptor.name);
        self.shop_url.clone_from(&descriptor.shop_url);
        self.declared_product_count = descriptor.total_product_count;
        self
    }

    pub fn failed(mut self, failure: ShopFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|failure| failure.kind)
    }
}
