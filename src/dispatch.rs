// src/dispatch.rs
//! Keyword matching and in-order delivery of matched items.

use chrono::{FixedOffset, Offset, Utc};
use metrics::counter;
use std::collections::BTreeSet;

use crate::feed::FeedItem;
use crate::notify::Sink;

pub const DEFAULT_LINK_BASE: &str = "https://twitter.com/i/web/status/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeywordError {
    #[error("keyword set is empty")]
    Empty,
}

/// Literal, case-sensitive keywords, kept exactly as configured.
/// Never empty; `""` entries are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    words: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(items: I) -> Result<Self, KeywordError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for it in items {
            let k = it.as_ref();
            if !k.is_empty() {
                set.insert(k.to_string());
            }
        }
        if set.is_empty() {
            return Err(KeywordError::Empty);
        }
        Ok(Self {
            words: set.into_iter().collect(),
        })
    }

    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.words
            .iter()
            .find(|k| text.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Whole-hour UTC offset for rendered times; out-of-range values fall back to UTC.
pub fn offset_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix())
}

/// How a matched item is rendered into a sink message.
#[derive(Debug, Clone)]
pub struct MessageFormat {
    pub link_base: String,
    /// Append author/time lines when the source supplied them.
    pub enrich: bool,
    pub utc_offset: FixedOffset,
}

impl Default for MessageFormat {
    fn default() -> Self {
        Self {
            link_base: DEFAULT_LINK_BASE.to_string(),
            enrich: false,
            utc_offset: offset_hours(9),
        }
    }
}

impl MessageFormat {
    pub fn link(&self, id: &str) -> String {
        format!("{}{}", self.link_base, id)
    }

    pub fn render(&self, item: &FeedItem) -> String {
        let mut out = format!("🔔 {}", self.link(&item.id));
        if self.enrich {
            if let Some(author) = item.author_name.as_deref().or(item.author_id.as_deref()) {
                out.push_str(&format!("\n👤 @{author}"));
            }
            if let Some(ts) = item.created_at {
                let local = ts.with_timezone(&self.utc_offset);
                out.push_str(&format!("\n🕒 {}", local.format("%Y-%m-%d %H:%M %:z")));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DispatchSummary {
    pub considered: usize,
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Short anonymized id for a text; raw item text never reaches the logs.
pub(crate) fn text_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Walk `items` (oldest first), deliver matches one at a time and advance
/// `cursor` past every item considered, matched or not.
///
/// A failed delivery is logged and counted, never retried; later items
/// in the batch are still processed.
pub async fn dispatch(
    items: &[FeedItem],
    keywords: &KeywordSet,
    format: &MessageFormat,
    sink: &dyn Sink,
    cursor: &mut Option<String>,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    for item in items {
        summary.considered += 1;

        if let Some(kw) = keywords.first_match(&item.text) {
            summary.matched += 1;
            let message = format.render(item);
            match sink.deliver(&message).await {
                Ok(()) => {
                    summary.delivered += 1;
                    tracing::info!(
                        target: "relay",
                        id = %item.id,
                        keyword = kw,
                        sink = sink.name(),
                        "delivered match"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    counter!("relay_deliveries_failed_total").increment(1);
                    tracing::warn!(
                        target: "relay",
                        id = %item.id,
                        text = %text_hash(&item.text),
                        sink = sink.name(),
                        error = %e,
                        "delivery failed; not retried"
                    );
                }
            }
        } else {
            tracing::trace!(
                target: "relay",
                id = %item.id,
                text = %text_hash(&item.text),
                "no keyword"
            );
        }

        *cursor = Some(item.id.clone());
    }

    counter!("relay_items_considered_total").increment(summary.considered as u64);
    counter!("relay_matches_total").increment(summary.matched as u64);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str, text: &str) -> FeedItem {
        FeedItem {
            id: id.into(),
            text: text.into(),
            created_at: None,
            author_id: None,
            author_name: None,
        }
    }

    #[test]
    fn literal_keyword_match() {
        let kw = KeywordSet::new(["【指標】"]).unwrap();
        assert!(kw.matches("【指標】発表"));
        assert!(!kw.matches("no signal here"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let kw = KeywordSet::new(["CPI"]).unwrap();
        assert!(kw.matches("US CPI 3.2%"));
        assert!(!kw.matches("us cpi 3.2%"));
    }

    #[test]
    fn keyword_set_dedups_and_rejects_empty() {
        let kw = KeywordSet::new(["b", "", "a", "b"]).unwrap();
        assert_eq!(kw.as_slice(), &["a".to_string(), "b".to_string()]);
        assert_eq!(KeywordSet::new(["", ""]), Err(KeywordError::Empty));
        assert_eq!(KeywordSet::new(Vec::<String>::new()), Err(KeywordError::Empty));
    }

    #[test]
    fn keywords_keep_surrounding_whitespace() {
        let kw = KeywordSet::new(["CPI "]).unwrap();
        assert_eq!(kw.as_slice(), &["CPI ".to_string()]);
        assert!(!kw.matches("CPIX"));
        assert!(kw.matches("US CPI 3.2%"));

        let space = KeywordSet::new([" "]).unwrap();
        assert!(space.matches("a b"));
        assert!(!space.matches("ab"));
    }

    #[test]
    fn plain_message_is_bell_and_link() {
        let f = MessageFormat::default();
        assert_eq!(
            f.render(&item("1790", "x")),
            "🔔 https://twitter.com/i/web/status/1790"
        );
    }

    #[test]
    fn enriched_message_adds_author_and_time() {
        let f = MessageFormat {
            enrich: true,
            ..MessageFormat::default()
        };
        let mut it = item("5", "x");
        it.author_name = Some("jpx_info".into());
        it.created_at = Utc.with_ymd_and_hms(2025, 9, 6, 0, 30, 0).single();
        assert_eq!(
            f.render(&it),
            "🔔 https://twitter.com/i/web/status/5\n👤 @jpx_info\n🕒 2025-09-06 09:30 +09:00"
        );
    }

    #[test]
    fn enrich_without_fields_stays_plain() {
        let f = MessageFormat {
            enrich: true,
            ..MessageFormat::default()
        };
        assert_eq!(f.render(&item("5", "x")), "🔔 https://twitter.com/i/web/status/5");
    }

    #[test]
    fn offset_hours_falls_back_to_utc() {
        assert_eq!(offset_hours(9).local_minus_utc(), 9 * 3600);
        assert_eq!(offset_hours(48).local_minus_utc(), 0);
    }

    #[test]
    fn text_hash_is_short_hex() {
        let h = text_hash("abc");
        assert_eq!(h.len(), 12);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
