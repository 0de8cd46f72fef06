//! News processing pipeline.
//!
//! Every post from a watched channel flows through:
//! 1. `RelevanceClassifier` — LLM yes/no against the topic list
//! 2. `ForwardSink` — relevant posts are copied to the operator's chat
//! 3. `discover_urls` — links in the post text
//! 4. `ArticleSource` — article text per link
//! 5. `Summarizer` + `Notifier` — one email per summarized link
//!
//! `MessageProcessor` owns the control flow; `worker` feeds it.

pub mod classifier;
pub mod processor;
pub mod summarizer;
pub mod types;
pub mod urls;
pub mod worker;

pub use classifier::{RelevanceClassifier, Verdict, VerdictParser, VerdictPolicy};
pub use processor::{MessageProcessor, ProcessorDeps};
pub use summarizer::Summarizer;
pub use types::{ForwardSink, InboundMessage, MessageOutcome, Notifier, SummaryReport};
pub use urls::discover_urls;
pub use worker::run_pipeline;

/// First `max_chars` characters of `text`, cut on a char boundary.
/// The flag reports whether anything was cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}
