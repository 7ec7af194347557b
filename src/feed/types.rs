// src/feed/types.rs
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,                        // opaque, source-ordered
    pub text: String,                      // decoded post text
    pub created_at: Option<DateTime<Utc>>, // when the source reports it
    pub author_id: Option<String>,
    pub author_name: Option<String>, // display handle, e.g. "jpx_info"
}

/// One page as returned by the source, in the source's native order (newest first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPage {
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("rate limited (reset at {reset_at:?})")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("fetch failed: {message}")]
    Transient { message: String },
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch up to `page_size` items newer than `cursor` (`None` = most recent page).
    async fn fetch_since(&self, cursor: Option<&str>, page_size: u32)
        -> Result<RawPage, FetchError>;
    fn name(&self) -> &'static str;
}
