//! Automation-trigger webhook (IFTTT / Make / Zapier style).
//!
//! The message is posted as a one-field JSON object. IFTTT maker
//! applets read `value1`, which is the default field name.

use reqwest::Client;
use std::time::Duration;

use super::{post_json, Sink, SinkError};

pub const DEFAULT_FIELD: &str = "value1";

pub struct WebhookNotifier {
    url: String,
    field: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            field: DEFAULT_FIELD.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, n: u8) -> Self {
        self.max_retries = n;
        self
    }

    fn payload(&self, message: &str) -> serde_json::Value {
        let mut m = serde_json::Map::new();
        m.insert(self.field.clone(), serde_json::Value::from(message));
        serde_json::Value::Object(m)
    }
}

#[async_trait::async_trait]
impl Sink for WebhookNotifier {
    async fn deliver(&self, message: &str) -> Result<(), SinkError> {
        if self.field.trim().is_empty() {
            return Err(SinkError::Config("webhook field name is empty".into()));
        }
        let body = self.payload(message);
        post_json(&self.client, &self.url, &body, self.timeout, self.max_retries).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
