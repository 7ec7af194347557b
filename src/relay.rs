// src/relay.rs
//! One tick of the relay: poll → match/dispatch → persist.
//!
//! State (cursor + pause window) is owned by the caller and threaded through
//! `run_once`; nothing here is global, so several relays can coexist and
//! tests can drive ticks with a fixed clock.

use chrono::{DateTime, FixedOffset, Utc};
use metrics::{counter, gauge};

use crate::backoff::{rate_limit_notice, PauseWindow};
use crate::cursor::CursorStore;
use crate::dispatch::{dispatch, DispatchSummary, KeywordSet, MessageFormat};
use crate::feed::{self, FeedSource, FetchError, DEFAULT_PAGE_SIZE};
use crate::notify::Sink;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayState {
    pub cursor: Option<String>,
    pub pause: PauseWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Inside a pause window; nothing was fetched.
    Paused { until: DateTime<Utc> },
    Processed(DispatchSummary),
    RateLimited { until: DateTime<Utc> },
    FetchFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub outcome: TickOutcome,
    pub cursor_saved: bool,
}

pub struct Relay {
    source: Box<dyn FeedSource>,
    sink: Box<dyn Sink>,
    alert_sink: Option<Box<dyn Sink>>,
    store: Box<dyn CursorStore>,
    keywords: KeywordSet,
    format: MessageFormat,
    notice_offset: FixedOffset,
    page_size: u32,
}

impl Relay {
    pub fn new(
        source: Box<dyn FeedSource>,
        sink: Box<dyn Sink>,
        store: Box<dyn CursorStore>,
        keywords: KeywordSet,
    ) -> Self {
        let format = MessageFormat::default();
        Self {
            source,
            sink,
            alert_sink: None,
            store,
            notice_offset: format.utc_offset,
            keywords,
            format,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, n: u32) -> Self {
        self.page_size = n.max(1);
        self
    }

    pub fn with_format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }

    /// Rate-limit notices go here instead of the main sink.
    pub fn with_alert_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    pub fn with_notice_offset(mut self, offset: FixedOffset) -> Self {
        self.notice_offset = offset;
        self
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Startup state: cursor restored from the store if possible, no pause.
    pub async fn initial_state(&self) -> RelayState {
        let cursor = match self.store.load().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "relay", error = %e, "cursor load failed; starting unset");
                None
            }
        };
        tracing::info!(target: "relay", cursor = ?cursor, "relay state initialized");
        RelayState {
            cursor,
            pause: PauseWindow::default(),
        }
    }

    /// Run one tick at wall-clock `now`. Never fails: every error is
    /// handled here and reflected in the report and the returned state.
    pub async fn run_once(
        &self,
        mut state: RelayState,
        now: DateTime<Utc>,
    ) -> (RelayState, TickReport) {
        counter!("relay_ticks_total").increment(1);
        gauge!("relay_last_tick_ts").set(now.timestamp() as f64);

        if state.pause.is_paused(now) {
            let until = state.pause.until();
            tracing::debug!(target: "relay", %until, "paused; skipping fetch");
            return (state, report(now, TickOutcome::Paused { until }, false));
        }
        gauge!("relay_paused_until_ts").set(0.0);

        let polled = feed::poll(
            self.source.as_ref(),
            state.cursor.as_deref(),
            self.page_size,
        )
        .await;
        let items = match polled {
            Ok(items) => items,
            Err(FetchError::RateLimited { reset_at }) => {
                let until = state.pause.pause_for(reset_at, now);
                counter!("relay_rate_limited_total").increment(1);
                gauge!("relay_paused_until_ts").set(until.timestamp() as f64);
                tracing::warn!(
                    target: "relay",
                    source = self.source.name(),
                    reset_at = ?reset_at,
                    %until,
                    "rate limited; pausing"
                );
                self.send_notice(until).await;
                return (state, report(now, TickOutcome::RateLimited { until }, false));
            }
            Err(FetchError::Transient { message }) => {
                counter!("relay_fetch_errors_total").increment(1);
                tracing::warn!(
                    target: "relay",
                    source = self.source.name(),
                    %message,
                    "fetch failed"
                );
                return (state, report(now, TickOutcome::FetchFailed { message }, false));
            }
        };

        state.pause.clear();

        let before = state.cursor.clone();
        let summary = dispatch(
            &items,
            &self.keywords,
            &self.format,
            self.sink.as_ref(),
            &mut state.cursor,
        )
        .await;

        let mut saved = false;
        if state.cursor != before {
            if let Some(c) = state.cursor.as_deref() {
                match self.store.save(c).await {
                    Ok(()) => saved = true,
                    Err(e) => {
                        counter!("relay_cursor_save_errors_total").increment(1);
                        tracing::warn!(
                            target: "relay",
                            error = %e,
                            "cursor save failed; keeping in-memory cursor"
                        );
                    }
                }
            }
        }

        tracing::info!(
            target: "relay",
            considered = summary.considered,
            matched = summary.matched,
            delivered = summary.delivered,
            failed = summary.failed,
            cursor = ?state.cursor,
            "tick done"
        );

        (state, report(now, TickOutcome::Processed(summary), saved))
    }

    async fn send_notice(&self, until: DateTime<Utc>) {
        let sink = self.alert_sink.as_deref().unwrap_or(self.sink.as_ref());
        let msg = rate_limit_notice(until, self.notice_offset);
        if let Err(e) = sink.deliver(&msg).await {
            tracing::warn!(
                target: "relay",
                sink = sink.name(),
                error = %e,
                "rate-limit notice failed"
            );
        }
    }
}

fn report(at: DateTime<Utc>, outcome: TickOutcome, cursor_saved: bool) -> TickReport {
    TickReport {
        at,
        outcome,
        cursor_saved,
    }
}
