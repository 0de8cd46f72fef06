//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionError, CompletionModel, Message};
use rig::http_client;

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// `LlmProvider` backed by any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    max_tokens_param: Option<&'static str>,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            max_tokens_param: None,
        }
    }

    /// Send the output limit as this raw request field instead of through
    /// rig's `max_tokens`, for models whose rig request type drops it.
    pub fn with_max_tokens_param(mut self, field: &'static str) -> Self {
        self.max_tokens_param = Some(field);
        self
    }
}

/// Map a rig failure onto our error kinds by HTTP status where there is one.
fn map_completion_error(provider: &str, error: CompletionError) -> LlmError {
    if let CompletionError::HttpError(http_client::Error::InvalidStatusCodeWithMessage(status, _)) =
        &error
    {
        match status.as_u16() {
            401 | 403 => {
                return LlmError::AuthFailed {
                    provider: provider.to_string(),
                };
            }
            429 => {
                return LlmError::RateLimited {
                    provider: provider.to_string(),
                    retry_after: None,
                };
            }
            _ => {}
        }
    }
    if let CompletionError::ResponseError(reason) = &error {
        return LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: reason.clone(),
        };
    }
    LlmError::RequestFailed {
        provider: provider.to_string(),
        reason: error.to_string(),
    }
}

/// Split chat messages into rig's (preamble, history, prompt) shape.
///
/// System messages are joined into the preamble; the last user message is
/// the prompt; everything between is history.
fn split_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Message>, String) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let preamble = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };

    let mut conversation: Vec<&ChatMessage> =
        messages.iter().filter(|m| m.role != Role::System).collect();

    let prompt = match conversation.last() {
        Some(last) if last.role == Role::User => {
            let content = last.content.clone();
            conversation.pop();
            content
        }
        _ => String::new(),
    };

    let history = conversation
        .into_iter()
        .map(|m| match m.role {
            Role::Assistant => Message::assistant(m.content.clone()),
            _ => Message::user(m.content.clone()),
        })
        .collect();

    (preamble, history, prompt)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = split_messages(&request.messages);
        if prompt.is_empty() {
            return Err(LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: "request has no user prompt".into(),
            });
        }

        let mut builder = self.model.completion_request(prompt);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if !history.is_empty() {
            builder = builder.messages(history);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = match self.max_tokens_param {
                Some(field) => {
                    let mut params = serde_json::Map::new();
                    params.insert(field.to_string(), max_tokens.into());
                    builder.additional_params(serde_json::Value::Object(params))
                }
                None => builder.max_tokens(u64::from(max_tokens)),
            };
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_completion_error(&self.model_name, e))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        tracing::debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX),
        })
    }
}
