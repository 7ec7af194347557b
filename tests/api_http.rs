// tests/api_http.rs
//
// HTTP-level tests for the liveness Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::{Arc, RwLock};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use keyword_feed_relay::api::{self, AppState};
use keyword_feed_relay::dispatch::DispatchSummary;
use keyword_feed_relay::scheduler::{RelayStatus, SharedStatus};
use keyword_feed_relay::{RelayState, TickOutcome, TickReport};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> (Router, SharedStatus) {
    let status: SharedStatus = Arc::new(RwLock::new(RelayStatus {
        source: "stub".into(),
        interval_secs: 60,
        ..RelayStatus::default()
    }));
    (
        api::create_router(AppState {
            status: status.clone(),
        }),
        status,
    )
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let (app, _) = test_router();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().trim(), "OK");
}

#[tokio::test]
async fn status_reflects_last_tick() {
    let (app, status) = test_router();
    let at = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
    let state = RelayState {
        cursor: Some("12".into()),
        ..RelayState::default()
    };
    let report = TickReport {
        at,
        outcome: TickOutcome::Processed(DispatchSummary {
            considered: 3,
            matched: 1,
            delivered: 1,
            failed: 0,
        }),
        cursor_saved: true,
    };
    status.write().unwrap().record(&state, &report);

    let req = Request::builder()
        .uri("/status")
        .body(Body::empty())
        .expect("build GET /status");
    let resp = app.oneshot(req).await.expect("oneshot /status");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read json");
    let v: Json = serde_json::from_slice(&bytes).expect("parse status json");

    assert_eq!(v["source"], "stub");
    assert_eq!(v["ticks"], 1);
    assert_eq!(v["cursor"], "12");
    assert!(v["paused_until"].is_null());
    assert_eq!(v["last_tick"]["outcome"]["kind"], "processed");
    assert_eq!(v["last_tick"]["outcome"]["delivered"], 1);
    assert_eq!(v["last_tick"]["cursor_saved"], true);
}
