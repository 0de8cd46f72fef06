//! Article summarization via the LLM.

use std::sync::Arc;

use tracing::debug;

use crate::error::PipelineError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::truncate_chars;

/// Default synopsis length in sentences.
pub const DEFAULT_SUMMARY_SENTENCES: u32 = 3;

/// Default cap on article characters sent to the model.
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 24_000;

/// Produces a short synopsis of an article.
pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
    sentences: u32,
    max_input_chars: usize,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            sentences: DEFAULT_SUMMARY_SENTENCES,
            max_input_chars: DEFAULT_SUMMARY_MAX_CHARS,
        }
    }

    pub fn with_sentences(mut self, sentences: u32) -> Self {
        self.sentences = sentences;
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Summarize `article_text`. Output length is not bounded; the raw
    /// completion is returned as-is.
    pub async fn summarize(&self, article_text: &str) -> Result<String, PipelineError> {
        let (text, truncated) = truncate_chars(article_text, self.max_input_chars);
        if truncated {
            debug!(
                limit = self.max_input_chars,
                "Article truncated for summarization"
            );
        }

        let request = CompletionRequest::new(vec![ChatMessage::user(build_summary_prompt(
            text,
            self.sentences,
        ))]);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(PipelineError::Summarize)?;

        Ok(response.content)
    }
}

fn build_summary_prompt(article_text: &str, sentences: u32) -> String {
    format!("{article_text}\n\nSummarize this news in {sentences} sentences.")
}
