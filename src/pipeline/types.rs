//! Shared types for the message processing pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelError;

// ── Inbound message ─────────────────────────────────────────────────

/// A new post seen on a watched channel.
///
/// Channel adapters convert their native updates into this struct.
/// The pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Locally generated ID for log correlation.
    pub id: Uuid,
    /// Who posted it (channel username or title).
    pub sender_id: String,
    /// Channel the post arrived on.
    pub channel_id: String,
    /// Text or media caption, if any.
    pub text: Option<String>,
    /// Post carries a photo, video, document or similar attachment.
    pub has_media: bool,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(sender_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            channel_id: channel_id.into(),
            text: None,
            has_media: false,
            received_at: Utc::now(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_media(mut self, has_media: bool) -> Self {
        self.has_media = has_media;
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Text to work with, treating empty and whitespace-only text as absent.
    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

// ── Summary report ──────────────────────────────────────────────────

/// Everything the notifier needs for one summarized article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub source_url: String,
    pub original_message_text: String,
    pub summary_text: String,
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Where a message left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// No text; nothing to classify.
    MediaOnly,
    /// Classifier said no (or could not say).
    NotRelevant,
    /// Relevant and forwarded, but carried no links.
    NoUrls,
    /// Links were processed; `summarized` of `urls` produced a report.
    Processed { urls: usize, summarized: usize },
}

impl MessageOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MediaOnly => "media_only",
            Self::NotRelevant => "not_relevant",
            Self::NoUrls => "no_urls",
            Self::Processed { .. } => "processed",
        }
    }
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Forwards relevant raw messages to the operator's archive chat.
#[async_trait]
pub trait ForwardSink: Send + Sync {
    async fn forward(&self, destination_id: &str, text: &str) -> Result<(), ChannelError>;
}

/// Delivers summary reports.
///
/// Implementations log and swallow their own failures; a failed
/// notification never reaches the pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &SummaryReport);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_treats_blank_as_absent() {
        let msg = InboundMessage::new("euronews_tr", "-100123");
        assert!(msg.text_content().is_none());

        let msg = msg.with_text("   \n");
        assert!(msg.text_content().is_none());

        let msg = InboundMessage::new("euronews_tr", "-100123").with_text("Breaking");
        assert_eq!(msg.text_content(), Some("Breaking"));
    }

    #[test]
    fn builder_sets_media_flag() {
        let msg = InboundMessage::new("a", "b").with_media(true);
        assert!(msg.has_media);
        assert!(msg.text.is_none());
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(MessageOutcome::MediaOnly.label(), "media_only");
        assert_eq!(MessageOutcome::NotRelevant.label(), "not_relevant");
        assert_eq!(MessageOutcome::NoUrls.label(), "no_urls");
        assert_eq!(
            MessageOutcome::Processed {
                urls: 2,
                summarized: 1
            }
            .label(),
            "processed"
        );
    }

    #[test]
    fn message_ids_are_unique() {
        let a = InboundMessage::new("s", "c");
        let b = InboundMessage::new("s", "c");
        assert_ne!(a.id, b.id);
    }
}
