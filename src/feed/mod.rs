// src/feed/mod.rs
pub mod twitter;
pub mod types;

use std::cmp::Ordering;

use metrics::histogram;

pub use types::{FeedItem, FeedSource, FetchError, RawPage};

/// Page size used by every deployment so far.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Compare two feed ids. All-digit ids (snowflakes) order numerically;
/// anything else is only comparable for equality.
pub fn compare_ids(a: &str, b: &str) -> Option<Ordering> {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        return Some(a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    }
    (a == b).then_some(Ordering::Equal)
}

/// True if `id` is the cursor itself or provably older than it.
pub fn is_at_or_before(id: &str, cursor: &str) -> bool {
    matches!(
        compare_ids(id, cursor),
        Some(Ordering::Less | Ordering::Equal)
    )
}

/// Fetch one page newer than `cursor` and return it oldest-first.
///
/// Items the source should have filtered out by its own since-filter
/// (at or before the cursor) are dropped here as well. The cursor itself
/// is never touched; advancing it is the caller's job.
pub async fn poll(
    source: &dyn FeedSource,
    cursor: Option<&str>,
    page_size: u32,
) -> Result<Vec<FeedItem>, FetchError> {
    let t0 = std::time::Instant::now();
    let page = source.fetch_since(cursor, page_size).await;
    histogram!("relay_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    let mut items = page?.items;
    items.reverse();

    if let Some(c) = cursor {
        let before = items.len();
        items.retain(|it| !is_at_or_before(&it.id, c));
        let stale = before - items.len();
        if stale > 0 {
            tracing::debug!(
                target: "relay",
                source = source.name(),
                stale,
                "dropped items at or before cursor"
            );
        }
    }

    Ok(items)
}
