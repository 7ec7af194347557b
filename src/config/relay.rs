// src/config/relay.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::cursor::{CursorStore, FileCursorStore, MemoryCursorStore};
use crate::dispatch::{offset_hours, KeywordSet, MessageFormat, DEFAULT_LINK_BASE};
use crate::feed::twitter::{query_from_keywords, Endpoint, TwitterSource, DEFAULT_API_BASE};
use crate::feed::DEFAULT_PAGE_SIZE;
use crate::notify::{
    DiscordNotifier, LogSink, Sink, SinkMux, SlackNotifier, WebhookNotifier,
};
use crate::relay::Relay;

pub const ENV_RELAY_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";
pub const DEFAULT_RELAY_CONFIG_PATH: &str = "config/relay.toml";
const FALLBACK_JSON_PATH: &str = "config/relay.json";

pub const ENV_POLL_INTERVAL_SECS: &str = "POLL_INTERVAL_SECS";
pub const ENV_RELAY_KEYWORDS: &str = "RELAY_KEYWORDS";

fn default_interval_secs() -> u64 {
    60
}
fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}
fn default_link_base() -> String {
    DEFAULT_LINK_BASE.to_string()
}
fn default_notice_offset() -> i32 {
    9
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Absent = in-memory cursor (lost on restart).
    #[serde(default)]
    pub cursor_path: Option<PathBuf>,
    pub source: SourceConfig,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
    /// Rate-limit notices; falls back to `sinks` when empty.
    #[serde(default)]
    pub alert_sinks: Vec<SinkConfig>,
    #[serde(default = "default_link_base")]
    pub link_base: String,
    #[serde(default)]
    pub enrich: bool,
    #[serde(default = "default_notice_offset")]
    pub notice_utc_offset_hours: i32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    List {
        list_id: String,
        /// "ENV" means: read from TWITTER_BEARER_TOKEN
        bearer_token: String,
        #[serde(default = "default_api_base")]
        api_base: String,
    },
    Search {
        /// Built from the keywords when absent.
        #[serde(default)]
        query: Option<String>,
        bearer_token: String,
        #[serde(default = "default_api_base")]
        api_base: String,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// "ENV" means: read from DISCORD_WEBHOOK_URL
    Discord { webhook_url: String },
    /// "ENV" means: read from SLACK_WEBHOOK_URL
    Slack { webhook_url: String },
    /// "ENV" means: read from AUTOMATION_WEBHOOK_URL
    Webhook {
        url: String,
        #[serde(default)]
        field: Option<String>,
    },
}

/// Resolve a secret that may be the literal "ENV" placeholder.
fn resolve_secret(value: &str, env_name: &str) -> Result<String> {
    if value.trim().eq_ignore_ascii_case("env") {
        return env::var(env_name).map_err(|_| anyhow!("Missing {env_name} env var"));
    }
    Ok(value.to_string())
}

impl RelayConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading relay config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = Self::parse(&data, &ext)
            .with_context(|| format!("parsing relay config {}", path.display()))?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $RELAY_CONFIG_PATH
    /// 2) config/relay.toml
    /// 3) config/relay.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_RELAY_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_RELAY_CONFIG_PATH} points to non-existent path");
            }
            return Self::load_from_file(&pb);
        }
        for p in [DEFAULT_RELAY_CONFIG_PATH, FALLBACK_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }
        Err(anyhow!(
            "no relay config found (set {ENV_RELAY_CONFIG_PATH} or create {DEFAULT_RELAY_CONFIG_PATH})"
        ))
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        if hint_ext == "json" {
            return Ok(serde_json::from_str(s)?);
        }
        match toml::from_str(s) {
            Ok(cfg) => Ok(cfg),
            Err(toml_err) => serde_json::from_str(s).map_err(|_| anyhow!(toml_err)),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var(ENV_POLL_INTERVAL_SECS) {
            self.interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_POLL_INTERVAL_SECS}={v} is not a number"))?;
        }
        if let Ok(v) = env::var(ENV_RELAY_KEYWORDS) {
            self.keywords = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("interval_secs must be > 0");
        }
        if !(1..=100).contains(&self.page_size) {
            bail!("page_size must be within 1..=100 (got {})", self.page_size);
        }
        if self.sinks.is_empty() {
            bail!("at least one sink must be configured");
        }
        self.keyword_set()?;
        Ok(())
    }

    pub fn keyword_set(&self) -> Result<KeywordSet> {
        KeywordSet::new(&self.keywords).context("keywords")
    }

    pub fn message_format(&self) -> MessageFormat {
        MessageFormat {
            link_base: self.link_base.clone(),
            enrich: self.enrich,
            utc_offset: offset_hours(self.notice_utc_offset_hours),
        }
    }

    pub fn build_source(&self) -> Result<TwitterSource> {
        let src = match &self.source {
            SourceConfig::List {
                list_id,
                bearer_token,
                api_base,
            } => {
                if list_id.trim().is_empty() {
                    bail!("source.list_id is empty");
                }
                let token = resolve_secret(bearer_token, "TWITTER_BEARER_TOKEN")?;
                TwitterSource::list(list_id.trim(), token).with_api_base(api_base.as_str())
            }
            SourceConfig::Search {
                query,
                bearer_token,
                api_base,
            } => {
                let token = resolve_secret(bearer_token, "TWITTER_BEARER_TOKEN")?;
                let q = match query.as_deref().map(str::trim) {
                    Some(q) if !q.is_empty() => q.to_string(),
                    _ => query_from_keywords(self.keyword_set()?.as_slice()),
                };
                TwitterSource::new(Endpoint::Search { query: q }, token)
                    .with_api_base(api_base.as_str())
            }
        };
        Ok(src)
    }

    pub fn build_cursor_store(&self) -> Box<dyn CursorStore> {
        match &self.cursor_path {
            Some(p) => Box::new(FileCursorStore::new(p.clone())),
            None => Box::new(MemoryCursorStore::new()),
        }
    }

    /// Assemble the relay. Fails on missing secrets or an empty keyword set.
    pub fn build_relay(&self) -> Result<Relay> {
        self.build_relay_with_store(self.build_cursor_store())
    }

    pub fn build_relay_with_store(&self, store: Box<dyn CursorStore>) -> Result<Relay> {
        let sink = build_sinks(&self.sinks)?;
        let alert = if self.alert_sinks.is_empty() {
            None
        } else {
            Some(build_sinks(&self.alert_sinks)?)
        };
        self.assemble(store, sink, alert)
    }

    /// Same feed, keywords and format, but every message goes to the log
    /// instead of the configured webhooks.
    pub fn build_dry_run_relay(&self, store: Box<dyn CursorStore>) -> Result<Relay> {
        self.assemble(store, Box::new(LogSink), None)
    }

    fn assemble(
        &self,
        store: Box<dyn CursorStore>,
        sink: Box<dyn Sink>,
        alert: Option<Box<dyn Sink>>,
    ) -> Result<Relay> {
        let keywords = self.keyword_set()?;
        let source = self.build_source()?;
        let format = self.message_format();
        let offset = format.utc_offset;

        let mut relay = Relay::new(Box::new(source), sink, store, keywords)
            .with_page_size(self.page_size)
            .with_format(format)
            .with_notice_offset(offset);
        if let Some(alert) = alert {
            relay = relay.with_alert_sink(alert);
        }
        Ok(relay)
    }
}

pub fn build_sink(cfg: &SinkConfig) -> Result<Box<dyn Sink>> {
    let sink: Box<dyn Sink> = match cfg {
        SinkConfig::Discord { webhook_url } => Box::new(DiscordNotifier::new(resolve_secret(
            webhook_url,
            "DISCORD_WEBHOOK_URL",
        )?)),
        SinkConfig::Slack { webhook_url } => Box::new(SlackNotifier::new(resolve_secret(
            webhook_url,
            "SLACK_WEBHOOK_URL",
        )?)),
        SinkConfig::Webhook { url, field } => {
            let w = WebhookNotifier::new(resolve_secret(url, "AUTOMATION_WEBHOOK_URL")?);
            match field {
                Some(f) => Box::new(w.with_field(f.clone())),
                None => Box::new(w),
            }
        }
    };
    Ok(sink)
}

/// One sink as-is, several behind a mux.
pub fn build_sinks(cfgs: &[SinkConfig]) -> Result<Box<dyn Sink>> {
    let mut sinks = cfgs.iter().map(build_sink).collect::<Result<Vec<_>>>()?;
    match sinks.len() {
        0 => bail!("no sinks configured"),
        1 => Ok(sinks.remove(0)),
        _ => Ok(Box::new(SinkMux::new(sinks))),
    }
}
