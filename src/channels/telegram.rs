//! Telegram channel — long-polls the Bot API for channel posts.
//!
//! The bot must be a member (for channels: an administrator) of every
//! watched chat. Posts from chats outside the configured list are dropped.
//! The same client forwards relevant posts to the operator's chat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::channels::{MessageSource, MessageStream};
use crate::error::ChannelError;
use crate::pipeline::types::{ForwardSink, InboundMessage};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Message fields that mark a post as carrying media.
const MEDIA_FIELDS: &[&str] = &[
    "photo",
    "video",
    "document",
    "audio",
    "voice",
    "animation",
    "sticker",
    "video_note",
];

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    channels: Vec<String>,
    client: reqwest::Client,
    shutdown: Arc<AtomicBool>,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, channels: Vec<String>) -> Self {
        Self {
            bot_token,
            channels,
            client: reqwest::Client::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Check if a chat is on the watch list.
    pub fn is_channel_watched(&self, chat: &serde_json::Value) -> bool {
        is_channel_watched(&self.channels, chat)
    }

    /// Send a plain-text message, split to fit Telegram's 4096 char limit.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
                "disable_web_page_preview": true,
            });

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.without_url().to_string(),
                })?;

            if !resp.status().is_success() {
                let status = resp.status();
                let err = resp.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: format!("sendMessage returned {status}: {err}"),
                });
            }
        }
        Ok(())
    }
}

// ── MessageSource implementation ────────────────────────────────────

#[async_trait]
impl MessageSource for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let channels = self.channels.clone();
        let client = self.client.clone();
        let shutdown = Arc::clone(&self.shutdown);

        tokio::spawn(async move {
            let mut offset: i64 = 0;
            tracing::info!(channels = ?channels, "Telegram channel listening for posts...");

            loop {
                if shutdown.load(Ordering::Relaxed) {
                    tracing::info!("Telegram poll loop shutting down");
                    return;
                }

                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": LONG_POLL_TIMEOUT_SECS,
                    "allowed_updates": ["channel_post", "message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e.without_url());
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    tracing::warn!(response = %data, "Telegram getUpdates returned no result");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(&channels, update) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        self.shutdown.store(true, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl ForwardSink for TelegramChannel {
    async fn forward(&self, destination_id: &str, text: &str) -> Result<(), ChannelError> {
        self.send_message(destination_id, text).await?;
        tracing::debug!(destination = %destination_id, "Message forwarded");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(bot_token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        bot_token.expose_secret()
    )
}

/// Check a chat object against the watch list.
///
/// Entries match the chat's numeric id exactly, or its username
/// case-insensitively with or without a leading `@`.
fn is_channel_watched(channels: &[String], chat: &serde_json::Value) -> bool {
    let id = chat
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string());
    let username = chat.get("username").and_then(serde_json::Value::as_str);

    channels.iter().any(|entry| {
        let entry = entry.trim();
        if id.as_deref() == Some(entry) {
            return true;
        }
        let name = entry.strip_prefix('@').unwrap_or(entry);
        username.is_some_and(|u| u.eq_ignore_ascii_case(name))
    })
}

/// Turn one getUpdates entry into an `InboundMessage` if it is a post from
/// a watched chat.
fn parse_update(channels: &[String], update: &serde_json::Value) -> Option<InboundMessage> {
    let message = update
        .get("channel_post")
        .or_else(|| update.get("message"))?;
    let chat = message.get("chat")?;

    if !is_channel_watched(channels, chat) {
        tracing::debug!(chat = %chat, "Ignoring post from unwatched chat");
        return None;
    }

    let chat_id = chat
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();

    let sender = chat
        .get("username")
        .or_else(|| chat.get("title"))
        .and_then(serde_json::Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| chat_id.clone());

    let text = message
        .get("text")
        .or_else(|| message.get("caption"))
        .and_then(serde_json::Value::as_str);

    let has_media = MEDIA_FIELDS.iter().any(|f| message.get(f).is_some());

    let received_at = message
        .get("date")
        .and_then(serde_json::Value::as_i64)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    let mut incoming = InboundMessage::new(sender, chat_id)
        .with_media(has_media)
        .with_received_at(received_at);
    if let Some(text) = text {
        incoming = incoming.with_text(text);
    }
    Some(incoming)
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let end = match remaining.char_indices().nth(max_len) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        // Find a good split point
        let chunk = &remaining[..end];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(end);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { end } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn channel(channels: &[&str]) -> TelegramChannel {
        TelegramChannel::new(
            SecretString::from("123:ABC"),
            channels.iter().map(|c| c.to_string()).collect(),
        )
    }

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel(&[]).name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel(&[]).api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    // ── Watch list ──────────────────────────────────────────────────

    #[test]
    fn watched_by_username() {
        let ch = channel(&["euronews_tr"]);
        assert!(ch.is_channel_watched(&json!({"id": -100, "username": "euronews_tr"})));
        assert!(ch.is_channel_watched(&json!({"id": -100, "username": "EuroNews_TR"})));
        assert!(!ch.is_channel_watched(&json!({"id": -100, "username": "euronews"})));
    }

    #[test]
    fn watched_by_at_prefixed_username() {
        let ch = channel(&["@channelname1"]);
        assert!(ch.is_channel_watched(&json!({"id": -7, "username": "channelname1"})));
    }

    #[test]
    fn watched_by_numeric_id() {
        let ch = channel(&["-1001234567890"]);
        assert!(ch.is_channel_watched(&json!({"id": -1001234567890_i64, "title": "Private"})));
        assert!(!ch.is_channel_watched(&json!({"id": -1001234567891_i64, "title": "Other"})));
    }

    #[test]
    fn empty_watch_list_watches_nothing() {
        let ch = channel(&[]);
        assert!(!ch.is_channel_watched(&json!({"id": 1, "username": "anything"})));
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parse_channel_text_post() {
        let update = json!({
            "update_id": 10,
            "channel_post": {
                "message_id": 5,
                "date": 1_700_000_000,
                "chat": {"id": -100, "type": "channel", "username": "euronews_tr", "title": "Euronews"},
                "text": "Check this out: https://example.com/a"
            }
        });
        let msg = parse_update(&["euronews_tr".into()], &update).unwrap();
        assert_eq!(msg.sender_id, "euronews_tr");
        assert_eq!(msg.channel_id, "-100");
        assert_eq!(msg.text.as_deref(), Some("Check this out: https://example.com/a"));
        assert!(!msg.has_media);
        assert_eq!(msg.received_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parse_photo_post_uses_caption() {
        let update = json!({
            "update_id": 11,
            "channel_post": {
                "date": 1_700_000_000,
                "chat": {"id": -100, "username": "euronews_tr"},
                "photo": [{"file_id": "x", "width": 90, "height": 90}],
                "caption": "Photo of the day"
            }
        });
        let msg = parse_update(&["euronews_tr".into()], &update).unwrap();
        assert!(msg.has_media);
        assert_eq!(msg.text.as_deref(), Some("Photo of the day"));
    }

    #[test]
    fn parse_media_only_post() {
        let update = json!({
            "update_id": 12,
            "channel_post": {
                "date": 1_700_000_000,
                "chat": {"id": -100, "title": "No Username"},
                "video": {"file_id": "v"}
            }
        });
        let msg = parse_update(&["-100".into()], &update).unwrap();
        assert!(msg.has_media);
        assert!(msg.text.is_none());
        assert_eq!(msg.sender_id, "No Username");
    }

    #[test]
    fn parse_ignores_unwatched_chat() {
        let update = json!({
            "update_id": 13,
            "channel_post": {
                "date": 1_700_000_000,
                "chat": {"id": -200, "username": "someone_else"},
                "text": "hello"
            }
        });
        assert!(parse_update(&["euronews_tr".into()], &update).is_none());
    }

    #[test]
    fn parse_ignores_non_message_updates() {
        let update = json!({"update_id": 14, "my_chat_member": {}});
        assert!(parse_update(&["euronews_tr".into()], &update).is_none());
    }

    // ── Splitting ───────────────────────────────────────────────────

    #[test]
    fn split_short_message_untouched() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
    }

    #[test]
    fn split_on_newline() {
        let text = format!("{}\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = split_message(&text, 15);
        assert_eq!(chunks, vec!["a".repeat(10), "b".repeat(10)]);
    }

    #[test]
    fn split_hard_cut_without_whitespace() {
        let chunks = split_message(&"x".repeat(25), 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn split_counts_chars_not_bytes() {
        let text = "ğ".repeat(20);
        let chunks = split_message(&text, 8);
        assert!(chunks.iter().all(|c| c.chars().count() <= 8));
        assert_eq!(chunks.concat(), text);
    }

    // ── Network error tests (expected to fail with no server) ───────

    #[tokio::test]
    async fn forward_with_fake_token_fails() {
        let ch = channel(&["euronews_tr"]);
        let result = ch.forward("123456", "hello").await;
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));
    }

    #[tokio::test]
    async fn shutdown_stops_poll_loop() {
        let ch = channel(&["euronews_tr"]);
        ch.shutdown().await.unwrap();
        let mut stream = ch.start().await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(5), stream.next()).await;
        assert!(matches!(next, Ok(None)));
    }
}
