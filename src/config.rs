//! Configuration types.
//!
//! Everything is read from environment variables once at start-up.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::extract::render::{
    DEFAULT_CONTENT_SELECTOR, DEFAULT_NETWORK_IDLE_TIMEOUT, DEFAULT_SETTLE_DELAY, RenderSettings,
};
use crate::llm::{LlmBackend, LlmConfig};
use crate::pipeline::classifier::{
    DEFAULT_CLASSIFY_MAX_CHARS, DEFAULT_CLASSIFY_MAX_TOKENS, VerdictPolicy,
};
use crate::pipeline::summarizer::{DEFAULT_SUMMARY_MAX_CHARS, DEFAULT_SUMMARY_SENTENCES};

/// Channels watched when `WATCH_CHANNELS` is unset.
pub const DEFAULT_CHANNELS: &[&str] = &["euronews_tr", "channelname1", "channelname2"];

/// Topics classified against when `WATCH_TOPICS` is unset.
pub const DEFAULT_TOPICS: &[&str] = &[
    "Gender Equality in Politics",
    "Sustainable Development",
    "Climate Change Initiatives",
    "Global Health Issues",
    "Technological Innovations in Education",
];

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub bot_token: SecretString,
    pub channels: Vec<String>,
    pub topics: Vec<String>,
    /// Chat that receives forwarded posts.
    pub operator_chat_id: String,
    pub classify_llm: LlmConfig,
    pub summary_llm: LlmConfig,
    pub classify_max_tokens: u32,
    pub classify_max_chars: usize,
    pub summary_sentences: u32,
    pub summary_max_chars: usize,
    pub verdict_policy: VerdictPolicy,
    pub render: RenderSettings,
    /// Messages handled at once. 1 is strictly sequential.
    pub concurrency: usize,
}

impl WatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let bot_token = SecretString::from(require("TELEGRAM_BOT_TOKEN")?);
        let operator_chat_id = require("WATCH_OPERATOR_CHAT_ID")?.trim().to_string();

        let channels = match get("WATCH_CHANNELS") {
            Some(raw) => split_list(&raw, ','),
            None => DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
        };
        let topics = match get("WATCH_TOPICS") {
            Some(raw) => split_list(&raw, ';'),
            None => DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
        };

        let backend = match get("NEWS_WATCH_BACKEND") {
            Some(raw) => LlmBackend::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "NEWS_WATCH_BACKEND".into(),
                message: format!("unknown backend '{raw}', expected 'openai' or 'anthropic'"),
            })?,
            None => LlmBackend::OpenAi,
        };
        let api_key = SecretString::from(require(backend.api_key_var())?);
        let base_url = get("NEWS_WATCH_LLM_BASE_URL");

        let classify_llm = LlmConfig {
            backend,
            api_key: api_key.clone(),
            model: get("NEWS_WATCH_CLASSIFY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            base_url: base_url.clone(),
        };
        let summary_llm = LlmConfig {
            backend,
            api_key,
            model: get("NEWS_WATCH_SUMMARY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            base_url,
        };

        let verdict_policy = match get("NEWS_WATCH_VERDICT") {
            Some(raw) => VerdictPolicy::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "NEWS_WATCH_VERDICT".into(),
                message: format!("unknown policy '{raw}', expected 'strict' or 'lenient'"),
            })?,
            None => VerdictPolicy::default(),
        };

        let settle_ms: u64 = parse_or(
            &get,
            "NEWS_WATCH_RENDER_SETTLE_MS",
            DEFAULT_SETTLE_DELAY.as_millis() as u64,
        )?;
        let render = RenderSettings {
            content_selector: get("NEWS_WATCH_RENDER_SELECTOR")
                .unwrap_or_else(|| DEFAULT_CONTENT_SELECTOR.into()),
            settle_delay: Duration::from_millis(settle_ms),
            network_idle_timeout: DEFAULT_NETWORK_IDLE_TIMEOUT,
            chrome_executable: get("NEWS_WATCH_CHROME_PATH").map(PathBuf::from),
        };

        Ok(Self {
            bot_token,
            channels,
            topics,
            operator_chat_id,
            classify_llm,
            summary_llm,
            classify_max_tokens: parse_or(
                &get,
                "NEWS_WATCH_CLASSIFY_MAX_TOKENS",
                DEFAULT_CLASSIFY_MAX_TOKENS,
            )?,
            classify_max_chars: parse_or(
                &get,
                "NEWS_WATCH_CLASSIFY_MAX_CHARS",
                DEFAULT_CLASSIFY_MAX_CHARS,
            )?,
            summary_sentences: parse_or(
                &get,
                "NEWS_WATCH_SUMMARY_SENTENCES",
                DEFAULT_SUMMARY_SENTENCES,
            )?,
            summary_max_chars: parse_or(
                &get,
                "NEWS_WATCH_SUMMARY_MAX_CHARS",
                DEFAULT_SUMMARY_MAX_CHARS,
            )?,
            verdict_policy,
            render,
            concurrency: parse_or(&get, "NEWS_WATCH_CONCURRENCY", 1usize)?.max(1),
        })
    }
}

fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}
