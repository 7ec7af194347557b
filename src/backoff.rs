// src/backoff.rs
//! Rate-limit pause window.
//!
//! Two states: active (`until` in the past) and paused (`until` in the future).
//! A rate-limit signal moves to paused; the first tick at or after `until`
//! polls again. While paused nothing is fetched.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};

/// Added on top of a provider-reported reset time.
pub const RESET_GRACE_SECS: i64 = 60;
/// Used when the provider gives no reset time.
pub const FALLBACK_PAUSE_SECS: i64 = 15 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PauseWindow {
    until: DateTime<Utc>,
}

impl Default for PauseWindow {
    fn default() -> Self {
        Self {
            until: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl PauseWindow {
    pub fn until(&self) -> DateTime<Utc> {
        self.until
    }

    /// `None` when no pause has been set since the last successful fetch.
    pub fn active_until(&self) -> Option<DateTime<Utc>> {
        (self.until > DateTime::<Utc>::UNIX_EPOCH).then_some(self.until)
    }

    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }

    pub fn clear(&mut self) {
        self.until = DateTime::<Utc>::UNIX_EPOCH;
    }

    /// Enter the paused state after a rate-limit signal observed at `now`.
    pub fn pause_for(
        &mut self,
        reset_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self.until = pause_until(reset_at, now);
        self.until
    }
}

/// `reset_at + 60s` when known, otherwise `now + 15min`.
pub fn pause_until(reset_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match reset_at {
        Some(reset) => reset + ChronoDuration::seconds(RESET_GRACE_SECS),
        None => now + ChronoDuration::seconds(FALLBACK_PAUSE_SECS),
    }
}

/// Human-readable notice for the alert channel, time shown in `offset`.
pub fn rate_limit_notice(until: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = until.with_timezone(&offset);
    format!(
        "⚠️ Feed rate limited; polling paused until {}",
        local.format("%H:%M %:z")
    )
}
