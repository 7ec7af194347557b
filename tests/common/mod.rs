// tests/common/mod.rs
//! Scripted feed source, recording sink and failing cursor store for tick tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use keyword_feed_relay::cursor::{CursorError, CursorStore};
use keyword_feed_relay::{FeedItem, FeedSource, FetchError, RawPage, Sink, SinkError};
use parking_lot::Mutex;

pub fn item(id: &str, text: &str) -> FeedItem {
    FeedItem {
        id: id.into(),
        text: text.into(),
        created_at: None,
        author_id: None,
        author_name: None,
    }
}

/// Page in the order a real source returns it (newest first).
pub fn newest_first(items: &[(&str, &str)]) -> RawPage {
    let mut v: Vec<FeedItem> = items.iter().map(|(id, t)| item(id, t)).collect();
    v.sort_by_key(|it| std::cmp::Reverse(it.id.parse::<u64>().unwrap_or(0)));
    RawPage { items: v }
}

#[derive(Clone, Default)]
pub struct StubSource {
    replies: Arc<Mutex<VecDeque<Result<RawPage, FetchError>>>>,
    calls: Arc<Mutex<Vec<(Option<String>, u32)>>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Result<RawPage, FetchError>) -> &Self {
        self.replies.lock().push_back(reply);
        self
    }

    /// `(cursor, page_size)` of every fetch so far.
    pub fn calls(&self) -> Vec<(Option<String>, u32)> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl FeedSource for StubSource {
    async fn fetch_since(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RawPage, FetchError> {
        self.calls
            .lock()
            .push((cursor.map(str::to_string), page_size));
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RawPage::default()))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<String>>>,
    attempts: Arc<Mutex<usize>>,
    fail_containing: Arc<Mutex<Option<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery whose message contains `needle`.
    pub fn failing_on(needle: &str) -> Self {
        let s = Self::default();
        *s.fail_containing.lock() = Some(needle.to_string());
        s
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait::async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, message: &str) -> Result<(), SinkError> {
        *self.attempts.lock() += 1;
        if let Some(n) = self.fail_containing.lock().as_deref() {
            if message.contains(n) {
                return Err(SinkError::Status {
                    status: 500,
                    body: "stub failure".into(),
                });
            }
        }
        self.messages.lock().push(message.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Loads fine, refuses every save.
pub struct BrokenStore;

#[async_trait::async_trait]
impl CursorStore for BrokenStore {
    async fn load(&self) -> Result<Option<String>, CursorError> {
        Ok(None)
    }

    async fn save(&self, _cursor: &str) -> Result<(), CursorError> {
        Err(CursorError::Io {
            path: "/dev/full".into(),
            source: std::io::Error::other("disk full"),
        })
    }
}

/// Store whose contents the test can inspect after the relay owns a clone.
#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<Option<String>>>,
    saves: Arc<Mutex<usize>>,
}

impl SharedStore {
    pub fn with_cursor(c: &str) -> Self {
        let s = Self::default();
        *s.inner.lock() = Some(c.to_string());
        s
    }

    pub fn get(&self) -> Option<String> {
        self.inner.lock().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait::async_trait]
impl CursorStore for SharedStore {
    async fn load(&self) -> Result<Option<String>, CursorError> {
        Ok(self.inner.lock().clone())
    }

    async fn save(&self, cursor: &str) -> Result<(), CursorError> {
        *self.inner.lock() = Some(cursor.to_string());
        *self.saves.lock() += 1;
        Ok(())
    }
}
