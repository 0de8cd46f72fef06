//! Message processor — drives one inbound message through the pipeline.
//!
//! Flow:
//! 1. No text → log media-only, stop
//! 2. Relevance classification → stop unless affirmative
//! 3. Forward the raw message to the operator's archive chat
//! 4. Discover links, then per link in order: extract → summarize → notify
//!
//! Each link is independent: an extraction or summarization failure skips
//! that link only. `handle()` is the containment boundary for everything
//! else; it never fails.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::extract::ArticleSource;
use crate::pipeline::classifier::RelevanceClassifier;
use crate::pipeline::summarizer::Summarizer;
use crate::pipeline::types::{
    ForwardSink, InboundMessage, MessageOutcome, Notifier, SummaryReport,
};
use crate::pipeline::urls::discover_urls;

/// Collaborators the processor needs, injected at construction.
pub struct ProcessorDeps {
    pub classifier: RelevanceClassifier,
    pub extractor: Arc<dyn ArticleSource>,
    pub summarizer: Summarizer,
    pub forwarder: Arc<dyn ForwardSink>,
    pub notifier: Arc<dyn Notifier>,
}

/// Message processor — classifies, forwards, extracts, summarizes, notifies.
pub struct MessageProcessor {
    deps: ProcessorDeps,
    topics: Vec<String>,
    operator_chat_id: String,
}

impl MessageProcessor {
    pub fn new(deps: ProcessorDeps, topics: Vec<String>, operator_chat_id: String) -> Self {
        Self {
            deps,
            topics,
            operator_chat_id,
        }
    }

    /// Process a message, logging any failure instead of returning it.
    pub async fn handle(&self, message: InboundMessage) {
        match self.process(&message).await {
            Ok(outcome) => {
                debug!(
                    id = %message.id,
                    outcome = outcome.label(),
                    "Message handled"
                );
            }
            Err(e) => {
                error!(
                    id = %message.id,
                    sender = %message.sender_id,
                    channel = %message.channel_id,
                    error = %e,
                    "Error occurred while processing message"
                );
            }
        }
    }

    /// Process a single inbound message through the full pipeline.
    pub async fn process(
        &self,
        message: &InboundMessage,
    ) -> Result<MessageOutcome, PipelineError> {
        let Some(text) = message.text_content() else {
            info!(
                id = %message.id,
                sender = %message.sender_id,
                has_media = message.has_media,
                "New media message received"
            );
            return Ok(MessageOutcome::MediaOnly);
        };

        if !self.deps.classifier.is_relevant(text, &self.topics).await {
            debug!(id = %message.id, "Message not relevant to any topic");
            return Ok(MessageOutcome::NotRelevant);
        }

        info!(
            id = %message.id,
            sender = %message.sender_id,
            text = %text,
            "New relevant text message"
        );
        self.deps
            .forwarder
            .forward(&self.operator_chat_id, text)
            .await?;

        let urls = discover_urls(text);
        if urls.is_empty() {
            info!(id = %message.id, "No URL found in the news message");
            return Ok(MessageOutcome::NoUrls);
        }

        let mut summarized = 0;
        for url in &urls {
            if self.process_url(url, text).await {
                summarized += 1;
            }
        }

        Ok(MessageOutcome::Processed {
            urls: urls.len(),
            summarized,
        })
    }

    /// Extract, summarize and notify one link. Returns whether a report was sent.
    async fn process_url(&self, url: &str, message_text: &str) -> bool {
        info!(url = %url, "Found link");

        let result = self.deps.extractor.extract(url).await;
        let Some(article_text) = result.text().filter(|t| !t.trim().is_empty()) else {
            error!(
                url = %url,
                error = result.error().unwrap_or("unknown"),
                "Article extraction failed"
            );
            return false;
        };
        if let Some(article) = result.article() {
            info!(
                url = %url,
                method = ?article.method,
                language = article.language.as_deref().unwrap_or("unknown"),
                title = article.title.as_deref().unwrap_or(""),
                "Extracted text: {}",
                article.text
            );
        }

        let summary_text = match self.deps.summarizer.summarize(article_text).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(url = %url, error = %e, "Summarization failed, skipping link");
                return false;
            }
        };

        let report = SummaryReport {
            source_url: url.to_string(),
            original_message_text: message_text.to_string(),
            summary_text,
        };
        self.deps.notifier.notify(&report).await;
        true
    }
}
