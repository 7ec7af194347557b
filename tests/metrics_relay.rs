// tests/metrics_relay.rs
#![cfg(feature = "strict-metrics")]

mod common;

use chrono::Utc;
use common::{newest_first, RecordingSink, SharedStore, StubSource};
use keyword_feed_relay::feed::twitter::TwitterSource;
use keyword_feed_relay::telemetry::Metrics;
use keyword_feed_relay::{FeedSource, FetchError, KeywordSet, Relay, RelayState};

#[tokio::test]
async fn metrics_exposed_after_ticks() {
    // Install a local recorder for the test
    let metrics = Metrics::init().expect("recorder");

    let source = StubSource::new();
    source.push(Ok(newest_first(&[("2", "kw"), ("1", "x")])));
    source.push(Err(FetchError::transient("boom")));
    let relay = Relay::new(
        Box::new(source.clone()),
        Box::new(RecordingSink::new()),
        Box::new(SharedStore::default()),
        KeywordSet::new(["kw"]).unwrap(),
    );

    let (state, _) = relay.run_once(RelayState::default(), Utc::now()).await;
    let _ = relay.run_once(state, Utc::now()).await;

    // Nothing listens on port 1: the request fails before any response.
    let unreachable = TwitterSource::list("1", "token").with_api_base("http://127.0.0.1:1");
    let err = unreachable.fetch_since(None, 5).await.unwrap_err();
    assert!(matches!(err, FetchError::Transient { .. }));

    // Scrape metrics text and check series presence by substring
    let out = metrics.handle.render();
    assert!(out.contains("relay_ticks_total"));
    assert!(out.contains("relay_items_considered_total"));
    assert!(out.contains("relay_matches_total"));
    assert!(out.contains("relay_fetch_errors_total"));
    assert!(out.contains("relay_fetch_ms"));
    assert!(out.contains("# HELP relay_provider_http_errors_total"));
}
