//! Test utilities
//!
//! In-memory [`ResourceFetcher`] fakes so pipeline stages can be exercised
//! without a network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::services::{FetchError, ResourceFetcher};

/// Serves canned responses by URL and records every request.
#[derive(Debug, Default)]
pub struct MapFetcher {
    responses: HashMap<String, Result<Vec<u8>, FetchError>>,
    hanging: HashSet<String>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl AsRef<[u8]>) -> Self {
        self.responses.insert(url.to_string(), Ok(body.as_ref().to_vec()));
        self
    }

    pub fn with_error(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }

    /// Requests for `url` never complete.
    pub fn hang(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.requested.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl ResourceFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());

        if self.hanging.contains(url) {
            std::future::pending::<()>().await;
        }

        self.responses
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

/// Minimal descriptor with an EAN column and a tab separated feed at `feed_url`.
pub fn descriptor_xml(name: &str, feed_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ShopInfo>
  <Name>{name}</Name>
  <Url>http://{name}.example/</Url>
  <Tabular>
    <CSV>
      <Url>{feed_url}</Url>
      <SpecialCharacters delimiter="[tab]" lineend="[lf]"/>
    </CSV>
    <Mappings>
      <Mapping column="0" columnName="EAN" type="ean"/>
      <Mapping column="1" columnName="Name" type="name"/>
    </Mappings>
  </Tabular>
</ShopInfo>
"#
    )
}

/// Feed matching [`descriptor_xml`]: one valid row, one with a bad checksum.
pub const FEED_TSV: &str = "EAN\tName\n4006381333931\tWidget\n4006381333932\tGadget\n";
