//! Runs a single tick against the configured feed and sinks, then prints the report.
//! Handy for checking credentials and keywords without starting the service.
//!
//! `RELAY_DRY_RUN=1` starts from the persisted cursor but never writes it back,
//! and logs matched messages instead of posting them to the webhooks.

use anyhow::Result;
use chrono::Utc;
use keyword_feed_relay::cursor::{CursorStore, MemoryCursorStore};
use keyword_feed_relay::telemetry::init_tracing;
use keyword_feed_relay::RelayConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RelayConfig::load_default()?;
    let dry_run = std::env::var("RELAY_DRY_RUN")
        .ok()
        .is_some_and(|v| v == "1");

    let relay = if dry_run {
        let store: Box<dyn CursorStore> = match cfg.build_cursor_store().load().await? {
            Some(c) => Box::new(MemoryCursorStore::with_cursor(c)),
            None => Box::new(MemoryCursorStore::new()),
        };
        cfg.build_dry_run_relay(store)?
    } else {
        cfg.build_relay()?
    };

    let state = relay.initial_state().await;
    let (state, report) = relay.run_once(state, Utc::now()).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("cursor: {}", state.cursor.as_deref().unwrap_or("-"));
    Ok(())
}
