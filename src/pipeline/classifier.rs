//! Topic relevance classification via the LLM.
//!
//! The model is asked for a bare "Yes"/"No". Its reply is free text, so
//! interpretation goes through a `VerdictParser`; anything the parser cannot
//! read as affirmative counts as not relevant.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::truncate_chars;

/// The literal affirmative token the model is asked to answer with.
pub const AFFIRMATIVE_TOKEN: &str = "Yes";

/// The literal negative token.
pub const NEGATIVE_TOKEN: &str = "No";

/// Default output bound for the classification call.
pub const DEFAULT_CLASSIFY_MAX_TOKENS: u32 = 10;

/// Default cap on message characters embedded in the prompt.
pub const DEFAULT_CLASSIFY_MAX_CHARS: usize = 4_000;

/// Parsed classifier reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Affirmative,
    Negative,
    /// Reply matched neither token, or the call failed. Carries the raw reply.
    Unparseable(String),
}

impl Verdict {
    /// Only an affirmative verdict is relevant.
    pub fn is_relevant(&self) -> bool {
        matches!(self, Self::Affirmative)
    }
}

/// Turns a raw model reply into a `Verdict`.
pub trait VerdictParser: Send + Sync {
    fn parse(&self, reply: &str) -> Verdict;
}

/// Exact, case-sensitive match on the tokens. `"yes"`, `"Yes."` and
/// `" Yes"` are all unparseable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTokenParser;

impl VerdictParser for ExactTokenParser {
    fn parse(&self, reply: &str) -> Verdict {
        match reply {
            AFFIRMATIVE_TOKEN => Verdict::Affirmative,
            NEGATIVE_TOKEN => Verdict::Negative,
            other => Verdict::Unparseable(other.to_string()),
        }
    }
}

/// Case-insensitive match after trimming whitespace, quotes and trailing
/// punctuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientParser;

impl VerdictParser for LenientParser {
    fn parse(&self, reply: &str) -> Verdict {
        let cleaned = reply
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*'))
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .trim();

        if cleaned.eq_ignore_ascii_case(AFFIRMATIVE_TOKEN) {
            Verdict::Affirmative
        } else if cleaned.eq_ignore_ascii_case(NEGATIVE_TOKEN) {
            Verdict::Negative
        } else {
            Verdict::Unparseable(reply.to_string())
        }
    }
}

/// Which parser the classifier uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerdictPolicy {
    #[default]
    Strict,
    Lenient,
}

impl VerdictPolicy {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "strict" | "exact" => Some(Self::Strict),
            "lenient" => Some(Self::Lenient),
            _ => None,
        }
    }

    pub fn parser(self) -> Arc<dyn VerdictParser> {
        match self {
            Self::Strict => Arc::new(ExactTokenParser),
            Self::Lenient => Arc::new(LenientParser),
        }
    }
}

/// Asks the LLM whether a message matches any configured topic.
pub struct RelevanceClassifier {
    llm: Arc<dyn LlmProvider>,
    parser: Arc<dyn VerdictParser>,
    max_tokens: u32,
    max_input_chars: usize,
}

impl RelevanceClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, parser: Arc<dyn VerdictParser>) -> Self {
        Self {
            llm,
            parser,
            max_tokens: DEFAULT_CLASSIFY_MAX_TOKENS,
            max_input_chars: DEFAULT_CLASSIFY_MAX_CHARS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Classify `message_text` against `topics`. Never fails: an LLM error
    /// becomes `Verdict::Unparseable` with an empty reply.
    pub async fn classify(&self, message_text: &str, topics: &[String]) -> Verdict {
        let (text, truncated) = truncate_chars(message_text, self.max_input_chars);
        if truncated {
            debug!(
                limit = self.max_input_chars,
                "Message truncated for classification"
            );
        }

        let request = CompletionRequest::new(vec![ChatMessage::user(build_classification_prompt(
            text, topics,
        ))])
        .with_max_tokens(self.max_tokens);

        match self.llm.complete(request).await {
            Ok(response) => {
                let verdict = self.parser.parse(&response.content);
                if let Verdict::Unparseable(ref raw) = verdict {
                    debug!(reply = %raw, "Classifier reply not understood, treating as not relevant");
                }
                verdict
            }
            Err(e) => {
                warn!(error = %e, "Classification call failed, treating as not relevant");
                Verdict::Unparseable(String::new())
            }
        }
    }

    pub async fn is_relevant(&self, message_text: &str, topics: &[String]) -> bool {
        self.classify(message_text, topics).await.is_relevant()
    }
}

/// Build the yes/no relevance prompt.
fn build_classification_prompt(message_text: &str, topics: &[String]) -> String {
    format!(
        "Is the following news text related to one of the listed topics?\n\
         Answer only '{AFFIRMATIVE_TOKEN}' or '{NEGATIVE_TOKEN}'.\n\
         Topics: {}\n\
         News: \"{}\"",
        topics.join(", "),
        message_text
    )
}
