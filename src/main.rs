//! Keyword feed relay — Shuttle entrypoint.
//! Spawns the polling scheduler and serves the liveness/status/metrics routes
//! the hosting platform health-checks.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use keyword_feed_relay::api::{self, AppState};
use keyword_feed_relay::scheduler::{spawn_relay_scheduler, RelayStatus};
use keyword_feed_relay::telemetry::{init_tracing, Metrics};
use keyword_feed_relay::RelayConfig;
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RelayConfig::load_default()?;
    let relay = cfg.build_relay()?;
    let metrics = Metrics::init()?;

    let status = Arc::new(RwLock::new(RelayStatus {
        source: relay.source_name().to_string(),
        interval_secs: cfg.interval_secs,
        ..RelayStatus::default()
    }));

    tracing::info!(
        target: "relay",
        source = relay.source_name(),
        keywords = relay.keywords().len(),
        interval_secs = cfg.interval_secs,
        "starting relay"
    );
    spawn_relay_scheduler(
        relay,
        Duration::from_secs(cfg.interval_secs),
        status.clone(),
    );

    let router = api::create_router(AppState { status }).merge(metrics.router());
    Ok(router.into())
}
