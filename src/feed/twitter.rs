// src/feed/twitter.rs
//! Twitter API v2 feed source (list timeline or recent search).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::counter;
use serde::Deserialize;

use crate::feed::types::{FeedItem, FeedSource, FetchError, RawPage};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Recent search rejects `max_results` below this.
const SEARCH_MIN_RESULTS: u32 = 10;
const RATE_LIMIT_TITLE: &str = "Too Many Requests";

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Option<Vec<Tweet>>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Problem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    List { list_id: String },
    Search { query: String },
}

pub struct TwitterSource {
    endpoint: Endpoint,
    bearer_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TwitterSource {
    pub fn list(list_id: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self::new(
            Endpoint::List {
                list_id: list_id.into(),
            },
            bearer_token,
        )
    }

    pub fn search(query: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self::new(
            Endpoint::Search {
                query: query.into(),
            },
            bearer_token,
        )
    }

    pub fn new(endpoint: Endpoint, bearer_token: impl Into<String>) -> Self {
        Self {
            endpoint,
            bearer_token: bearer_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different API host (proxies, local mocks).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn request_parts(&self, cursor: Option<&str>, page_size: u32) -> (String, Vec<(&str, String)>) {
        let mut query = vec![
            ("tweet.fields", "created_at,author_id".to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", "username".to_string()),
        ];
        let url = match &self.endpoint {
            Endpoint::List { list_id } => {
                query.push(("max_results", page_size.to_string()));
                format!("{}/2/lists/{}/tweets", self.api_base, list_id)
            }
            Endpoint::Search { query: q } => {
                query.push(("query", q.clone()));
                query.push(("max_results", page_size.max(SEARCH_MIN_RESULTS).to_string()));
                format!("{}/2/tweets/search/recent", self.api_base)
            }
        };
        if let Some(c) = cursor {
            query.push(("since_id", c.to_string()));
        }
        (url, query)
    }
}

/// Build a recent-search query that only returns posts containing a keyword.
pub fn query_from_keywords<S: AsRef<str>>(keywords: &[S]) -> String {
    keywords
        .iter()
        .map(|k| format!("\"{}\"", k.as_ref().replace('"', "")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn parse_reset_header(v: Option<&str>) -> Option<DateTime<Utc>> {
    let secs: i64 = v?.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Map one HTTP exchange into a page or a classified error.
pub fn parse_response(
    status: u16,
    rate_limit_reset: Option<&str>,
    body: &str,
) -> Result<RawPage, FetchError> {
    let reset_at = parse_reset_header(rate_limit_reset);

    if !(200..300).contains(&status) {
        let problem: Option<Problem> = serde_json::from_str(body).ok();
        let title = problem.as_ref().and_then(|p| p.title.as_deref());
        if status == 429 || title == Some(RATE_LIMIT_TITLE) {
            return Err(FetchError::RateLimited { reset_at });
        }
        let detail = problem
            .as_ref()
            .and_then(|p| p.detail.clone().or_else(|| p.title.clone()))
            .unwrap_or_else(|| body.chars().take(200).collect());
        return Err(FetchError::transient(format!("HTTP {status}: {detail}")));
    }

    let page: Page = serde_json::from_str(body)
        .map_err(|e| FetchError::transient(format!("parsing twitter json: {e}")))?;

    let tweets = match (page.data, page.errors) {
        (Some(data), errors) => {
            if let Some(errs) = errors.filter(|e| !e.is_empty()) {
                tracing::warn!(target: "relay", errors = errs.len(), "twitter partial errors");
            }
            data
        }
        (None, Some(errs)) if !errs.is_empty() => {
            let first = errs[0]
                .get("detail")
                .or_else(|| errs[0].get("title"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            if errs[0].get("title").and_then(|v| v.as_str()) == Some(RATE_LIMIT_TITLE) {
                return Err(FetchError::RateLimited { reset_at });
            }
            return Err(FetchError::transient(format!("twitter api errors: {first}")));
        }
        _ => Vec::new(),
    };

    let users: HashMap<String, String> = page
        .includes
        .map(|inc| inc.users.into_iter().map(|u| (u.id, u.username)).collect())
        .unwrap_or_default();

    let items = tweets
        .into_iter()
        .map(|t| FeedItem {
            author_name: t.author_id.as_ref().and_then(|a| users.get(a).cloned()),
            created_at: t.created_at.as_deref().and_then(parse_created_at),
            text: html_escape::decode_html_entities(&t.text).to_string(),
            author_id: t.author_id,
            id: t.id,
        })
        .collect();

    Ok(RawPage { items })
}

#[async_trait]
impl FeedSource for TwitterSource {
    async fn fetch_since(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RawPage, FetchError> {
        let (url, query) = self.request_parts(cursor, page_size);

        let resp = match self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&query)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                counter!("relay_provider_http_errors_total").increment(1);
                return Err(FetchError::transient(format!("twitter http get: {e}")));
            }
        };

        let status = resp.status().as_u16();
        let reset = resp
            .headers()
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::transient(format!("twitter http .text(): {e}")))?;

        parse_response(status, reset.as_deref(), &body)
    }

    fn name(&self) -> &'static str {
        match self.endpoint {
            Endpoint::List { .. } => "twitter-list",
            Endpoint::Search { .. } => "twitter-search",
        }
    }
}
