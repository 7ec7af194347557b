// src/notify/log.rs
//! Sink that only logs what it would have sent. Used for dry runs.

use super::{Sink, SinkError};

#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl Sink for LogSink {
    async fn deliver(&self, message: &str) -> Result<(), SinkError> {
        tracing::info!(target: "relay", sink = "log", %message, "dry run; not sent");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
