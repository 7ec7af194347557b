// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod backoff;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod feed;
pub mod notify;
pub mod relay;
pub mod scheduler;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::RelayConfig;
pub use crate::dispatch::{KeywordSet, MessageFormat};
pub use crate::feed::{FeedItem, FeedSource, FetchError, RawPage};
pub use crate::notify::{Sink, SinkError};
pub use crate::relay::{Relay, RelayState, TickOutcome, TickReport};
