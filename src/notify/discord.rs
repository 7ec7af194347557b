use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{post_json, Sink, SinkError};

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }
}

#[derive(Serialize)]
struct DiscordWebhookPayload<'a> {
    content: &'a str,
}

#[async_trait::async_trait]
impl Sink for DiscordNotifier {
    async fn deliver(&self, message: &str) -> Result<(), SinkError> {
        let payload = serde_json::to_value(DiscordWebhookPayload { content: message })
            .map_err(|e| SinkError::Config(format!("discord payload: {e}")))?;
        post_json(
            &self.client,
            &self.webhook,
            &payload,
            self.timeout,
            self.max_retries,
        )
        .await
    }

    fn name(&self) -> &str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_content_field() {
        let v = serde_json::to_value(DiscordWebhookPayload {
            content: "🔔 https://twitter.com/i/web/status/1",
        })
        .unwrap();
        assert_eq!(v["content"], "🔔 https://twitter.com/i/web/status/1");
    }
}
