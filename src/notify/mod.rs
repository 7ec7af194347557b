// src/notify/mod.rs
pub mod discord;
pub mod log;
pub mod slack;
pub mod webhook;

use std::time::Duration;

pub use discord::DiscordNotifier;
pub use log::LogSink;
pub use slack::SlackNotifier;
pub use webhook::WebhookNotifier;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("sink misconfigured: {0}")]
    Config(String),
}

/// Outbound notification target. Receives a preformatted message.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, message: &str) -> Result<(), SinkError>;
    fn name(&self) -> &str;
}

/// Fans one message out to several sinks, in order.
pub struct SinkMux {
    sinks: Vec<Box<dyn Sink>>,
}

impl SinkMux {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait::async_trait]
impl Sink for SinkMux {
    /// Every sink is tried; the first failure (if any) is returned.
    async fn deliver(&self, message: &str) -> Result<(), SinkError> {
        let mut first_err = None;
        for s in &self.sinks {
            if let Err(e) = s.deliver(message).await {
                tracing::warn!(target: "relay", sink = s.name(), error = %e, "sink delivery failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn name(&self) -> &str {
        "mux"
    }
}

/// POST `payload` as JSON, retrying only when the message cannot have
/// been delivered (connection refused/unreachable, or 429 from the receiver).
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    payload: &serde_json::Value,
    timeout: Duration,
    max_retries: u8,
) -> Result<(), SinkError> {
    let mut attempt: u8 = 0;
    loop {
        attempt += 1;
        let res = client.post(url).timeout(timeout).json(payload).send().await;
        let may_retry = attempt < max_retries.max(1);

        match res {
            Ok(rsp) => {
                let status = rsp.status();
                if status.is_success() {
                    return Ok(());
                }
                if status.as_u16() == 429 && may_retry {
                    tokio::time::sleep(backoff(attempt)).await;
                    continue;
                }
                let body = rsp.text().await.unwrap_or_default();
                return Err(SinkError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }
            Err(e) if e.is_connect() && may_retry => {
                tokio::time::sleep(backoff(attempt)).await;
            }
            Err(e) => return Err(SinkError::Http(e)),
        }
    }
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        hits: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Sink for Counting {
        async fn deliver(&self, _message: &str) -> Result<(), SinkError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SinkError::Config("boom".into()))
            } else {
                Ok(())
            }
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn mux_tries_every_sink_and_reports_failure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let sinks: Vec<Box<dyn Sink>> = vec![
            Box::new(Counting {
                hits: hits.clone(),
                fail: true,
            }),
            Box::new(Counting {
                hits: hits.clone(),
                fail: false,
            }),
        ];
        let mux = SinkMux::new(sinks);
        assert!(mux.deliver("hi").await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(1000));
        assert_eq!(backoff(200), Duration::from_millis(500 << 6));
    }
}
