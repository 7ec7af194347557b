// src/scheduler.rs
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::relay::{Relay, RelayState, TickOutcome, TickReport};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_ticks_total", "Scheduled ticks, paused ones included.");
        describe_counter!(
            "relay_items_considered_total",
            "Feed items walked by match & dispatch."
        );
        describe_counter!("relay_matches_total", "Items containing a keyword.");
        describe_counter!(
            "relay_deliveries_failed_total",
            "Sink deliveries that failed (not retried)."
        );
        describe_counter!(
            "relay_rate_limited_total",
            "Fetches answered with a rate-limit signal."
        );
        describe_counter!(
            "relay_fetch_errors_total",
            "Fetches that failed for other reasons."
        );
        describe_counter!(
            "relay_cursor_save_errors_total",
            "Cursor persistence failures."
        );
        describe_counter!(
            "relay_provider_http_errors_total",
            "Feed requests that failed before a response arrived."
        );
        describe_histogram!("relay_fetch_ms", "Feed fetch time in milliseconds.");
        describe_gauge!("relay_last_tick_ts", "Unix ts of the last tick.");
        describe_gauge!(
            "relay_paused_until_ts",
            "Unix ts until which polling is paused (0 = active)."
        );
    });
}

/// Snapshot exposed on `/status`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RelayStatus {
    pub source: String,
    pub interval_secs: u64,
    pub ticks: u64,
    pub cursor: Option<String>,
    pub paused_until: Option<DateTime<Utc>>,
    pub last_tick: Option<TickReport>,
    pub last_delivery_at: Option<DateTime<Utc>>,
}

impl RelayStatus {
    pub fn record(&mut self, state: &RelayState, report: &TickReport) {
        self.ticks += 1;
        self.cursor = state.cursor.clone();
        self.paused_until = state
            .pause
            .is_paused(report.at)
            .then(|| state.pause.until());
        if let TickOutcome::Processed(s) = &report.outcome {
            if s.delivered > 0 {
                self.last_delivery_at = Some(report.at);
            }
        }
        self.last_tick = Some(report.clone());
    }
}

pub type SharedStatus = Arc<RwLock<RelayStatus>>;

/// Drive `relay` every `interval`. Each tick is awaited before the next
/// one is considered, so ticks never overlap; fires missed while a tick
/// was running are skipped rather than queued.
pub fn spawn_relay_scheduler(
    relay: Relay,
    interval: Duration,
    status: SharedStatus,
) -> JoinHandle<()> {
    ensure_metrics_described();

    tokio::spawn(async move {
        let mut state = relay.initial_state().await;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let (next, report) = relay.run_once(state, Utc::now()).await;
            state = next;

            match status.write() {
                Ok(mut s) => s.record(&state, &report),
                Err(_) => tracing::warn!(target: "relay", "status lock poisoned"),
            }

            tracing::debug!(target: "relay", outcome = ?report.outcome, "scheduled tick");
        }
    })
}
