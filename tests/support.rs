//! Shared fakes for the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use shopinfo_harvester::{FetchError, ResourceFetcher};

/// Canned responses keyed by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeWeb {
    pages: HashMap<String, Result<Vec<u8>, FetchError>>,
    hanging: HashSet<String>,
    requests: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&mut self, url: impl Into<String>, body: impl AsRef<[u8]>) {
        self.pages.insert(url.into(), Ok(body.as_ref().to_vec()));
    }

    pub fn fail(&mut self, url: impl Into<String>, error: FetchError) {
        self.pages.insert(url.into(), Err(error));
    }

    pub fn hang(&mut self, url: impl Into<String>) {
        self.hanging.insert(url.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceFetcher for FakeWeb {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(url.to_string());
        if self.hanging.contains(url) {
            std::future::pending::<()>().await;
        }
        self.pages.get(url).cloned().unwrap_or(Err(FetchError::Status(404)))
    }
}

/// A listing line pointing at `http://<host>/index.html`.
pub fn listing_link(host: &str) -> String {
    format!(
        "<td><a target=\"_blank\" class=\"counter\" title=\"home\" \
         href=\"/redirect?redirect=http%3A%2F%2F{host}%2Findex.html&amp;rid=2\">Zum Shop</a></td>\n"
    )
}

pub fn descriptor(name: &str, feed_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ShopInfo>
  <Name>{name}</Name>
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

pub const FEED: &str = "EAN\tName\n4006381333931\tWidget\n4006381333932\tGadget\n";
