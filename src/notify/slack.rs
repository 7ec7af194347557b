use reqwest::Client;
use std::time::Duration;

use super::{post_json, Sink, SinkError};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, n: u8) -> Self {
        self.max_retries = n;
        self
    }
}

#[async_trait::async_trait]
impl Sink for SlackNotifier {
    async fn deliver(&self, message: &str) -> Result<(), SinkError> {
        let body = serde_json::json!({ "text": message });
        post_json(
            &self.client,
            &self.webhook_url,
            &body,
            self.timeout,
            self.max_retries,
        )
        .await
    }

    fn name(&self) -> &str {
        "slack"
    }
}
