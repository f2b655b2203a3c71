//! End-to-end harvest runs over a fake web
mod support;

use std::sync::Arc;

use shopinfo_harvester::application::write_json_lines;
use shopinfo_harvester::crawling::FailureKind;
use shopinfo_harvester::domain::ListingPage;
use shopinfo_harvester::{AppConfig, FetchError, Harvester};
use support::{descriptor, listing_link, FakeWeb, FEED};
use tempfile::TempDir;

const BASE: &str = "http://directory.example/nav";

fn config(dir: &TempDir, shop_count: u32, page_size: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.listing.base_url = BASE.to_string();
    config.listing.shop_count = shop_count;
    config.listing.page_size = page_size;
    config.cache.dir = dir.path().join("cache");
    config.workers.max_concurrent = 10;
    config.workers.fetch_timeout_seconds = 1;
    config
}

/// Ten shops on one listing page; shop 3 is unreachable, shop 7 never answers
/// for its feed.
fn ten_shops(hang_one: bool) -> FakeWeb {
    let mut web = FakeWeb::new();
    let mut listing = String::from("<html><body><table>\n");
    for n in 0..10 {
        let host = format!("shop{n}.example");
        listing.push_str(&listing_link(&host));

        let descriptor_url = format!("http://{host}/shopinfo.xml");
        let feed_url = format!("http://{host}/feed.tsv");
        if n == 3 {
            web.fail(descriptor_url, FetchError::Connect("connection refused".into()));
            continue;
        }
        web.serve(descriptor_url, descriptor(&host, &feed_url));
        if hang_one && n == 7 {
            web.hang(feed_url);
        } else {
            web.serve(feed_url, FEED);
        }
    }
    listing.push_str("</table></body></html>\n");
    web.serve(ListingPage::new(1, 50).url(BASE), listing);
    web
}

#[tokio::test]
async fn one_failing_shop_does_not_affect_the_others() {
    let dir = TempDir::new().unwrap();
    let harvester = Harvester::new(config(&dir, 10, 50), Arc::new(ten_shops(false)));

    let summary = harvester.run().await.unwrap();
    assert_eq!(summary.reports.len(), 10);
    assert_eq!(summary.shops_succeeded(), 9);
    assert_eq!(summary.shops_failed(), 1);
    assert_eq!(summary.failures_by_kind.get(&FailureKind::Transport), Some(&1));
    assert_eq!(summary.product_count(), 9);

    let failed = summary.reports.iter().find(|r| !r.is_success()).unwrap();
    assert_eq!(failed.descriptor_ref.as_str(), "http://shop3.example/shopinfo.xml");
}

#[tokio::test]
async fn hanging_fetch_is_cut_off_by_the_timeout() {
    let dir = TempDir::new().unwrap();
    let harvester = Harvester::new(config(&dir, 10, 50), Arc::new(ten_shops(true)));

    let summary = tokio::time::timeout(std::time::Duration::from_secs(30), harvester.run())
        .await
        .expect("harvest must not hang")
        .unwrap();

    assert_eq!(summary.reports.len(), 10);
    assert_eq!(summary.shops_succeeded(), 8);
    assert_eq!(summary.failures_by_kind.get(&FailureKind::Transport), Some(&2));

    let hung = summary
        .reports
        .iter()
        .filter_map(|r| r.failure.as_ref())
        .find(|f| f.resource == "http://shop7.example/feed.tsv")
        .unwrap();
    assert!(hung.message.contains("timed out"));
}

#[tokio::test]
async fn second_run_is_served_entirely_from_cache() {
    let dir = TempDir::new().unwrap();
    let web = Arc::new(ten_shops(false));

    let first = Harvester::new(config(&dir, 10, 50), web.clone()).run().await.unwrap();
    let calls_after_first = web.calls();
    // listing + 10 descriptors + 9 feeds
    assert_eq!(calls_after_first, 20);

    let second = Harvester::new(config(&dir, 10, 50), web.clone()).run().await.unwrap();
    // Only the failed descriptor is asked for again.
    assert_eq!(web.calls(), calls_after_first + 1);
    assert_eq!(first.product_count(), second.product_count());
}

#[tokio::test]
async fn products_export_as_json_lines() {
    let dir = TempDir::new().unwrap();
    let harvester = Harvester::new(config(&dir, 10, 50), Arc::new(ten_shops(false)));
    let summary = harvester.run().await.unwrap();

    let mut out = Vec::new();
    let written = write_json_lines(&summary, &mut out).await.unwrap();
    assert_eq!(written, 9);

    for line in String::from_utf8(out).unwrap().lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["ean"], "4006381333931");
        assert_eq!(value["name"], "Widget");
        assert!(value["brand"].is_null());
        assert!(value["shop_id"].is_u64());
    }
}
