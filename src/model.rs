//! The model client boundary (§4.C).
//!
//! The engine is oblivious to any LLM provider's wire format; a
//! [`ModelClient`] implementation is the thin adapter that owns that
//! translation. This module defines the trait boundary and the canonical
//! types that cross it; [`crate::providers::mock`] provides a deterministic
//! implementation used throughout the test suite.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ModelError;
use crate::message::{Content, Message, ToolCallRequest};
use crate::tool::ToolDefinition;
use crate::usage::UsageStats;

/// How the model should be steered towards (or away from) calling tools.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// The model decides whether to call a tool. Default.
    #[default]
    Auto,
    /// The model must call at least one tool.
    Required,
    /// The model must not call any tool.
    None,
    /// The model must call the named tool.
    Function(String),
}

/// Options accompanying a single `generate`/`generate_stream` call.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Tool definitions the model may call.
    pub tools: Vec<ToolDefinition>,
    /// Tool-choice steering.
    pub tool_choice: ToolChoice,
}

/// The model's turn, normalized away from any provider wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantTurn {
    /// Textual content, if any.
    pub content: Option<Content>,
    /// Tool-call requests, normalized to canonical form (§4.E).
    pub tool_calls: Vec<ToolCallRequest>,
    /// Token usage for this turn, if the provider reported it.
    pub usage: Option<UsageStats>,
    /// The model's stated reason for ending its turn: `stop`, `tool_calls`,
    /// or a provider-specific value the engine treats as non-`stop`.
    pub finish_reason: String,
}

impl AssistantTurn {
    /// Whether this turn requested at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Converts this turn into the [`Message::Assistant`] appended to
    /// memory by the step executor.
    #[must_use]
    pub fn into_message(self) -> Message {
        if self.tool_calls.is_empty() {
            match self.content {
                Some(content) => Message::assistant_text(content),
                None => Message::assistant_text(Content::text(String::new())),
            }
        } else {
            let mut msg = Message::assistant_tool_calls(self.tool_calls);
            if let Message::Assistant {
                content: slot,
                usage,
                finish_reason,
                ..
            } = &mut msg
            {
                *slot = self.content;
                *usage = self.usage;
                *finish_reason = Some(self.finish_reason.clone());
            }
            msg
        }
    }
}

/// One incremental fragment of a streamed generation (§4.C, §4.H).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Delta {
    /// A fragment of assistant text.
    Text(String),
    /// The stream has finished; carries the fully assembled turn.
    Done(AssistantTurn),
}

/// A boxed, `Send`, lazily-evaluated sequence of [`Delta`]s (§4.C).
pub type DeltaStream<'a> = Pin<Box<dyn Stream<Item = Result<Delta, ModelError>> + Send + 'a>>;

/// Adapter from canonical messages to an LLM provider (§4.C).
///
/// A client is polymorphic over `{generate, generate_stream, count_tokens}`.
/// Implementations MUST be `Send + Sync`: the underlying connection pool is
/// shared across concurrently executing runs (§5).
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A short identifier for structured-logging spans (§10.J).
    fn provider_name(&self) -> &str;

    /// Performs one non-streaming generation call.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Transient`] for retryable failures (the client
    /// may retry internally before surfacing this) or
    /// [`ModelError::Permanent`] for fatal ones.
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<AssistantTurn, ModelError>;

    /// Performs a streaming generation call, yielding incremental deltas.
    ///
    /// The default implementation reports that streaming is unsupported;
    /// providers that can stream override this.
    ///
    /// # Errors
    ///
    /// The returned stream's items are each fallible; a provider yields
    /// [`ModelError::Transient`] or [`ModelError::Permanent`] in place of a
    /// delta on failure.
    fn generate_stream<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a GenerateOptions,
    ) -> DeltaStream<'a> {
        let _ = (messages, options);
        Box::pin(futures::stream::once(async {
            Err(ModelError::Permanent(format!(
                "{} does not support streaming",
                self.provider_name()
            )))
        }))
    }

    /// Estimates the token cost of `messages`.
    ///
    /// Accuracy contract: within ±5% of the provider-reported count for a
    /// real provider; a test double may return any deterministic estimate.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the estimate cannot be computed.
    async fn count_tokens(&self, messages: &[Message]) -> Result<usize, ModelError>;

    /// Whether this client can stream (§4.C).
    fn supports_streaming(&self) -> bool {
        false
    }
}

/// A shared, type-erased model client, safe to hand to multiple concurrent
/// runs (§5: "the model client's underlying connection pool is shared
/// across runs").
pub type SharedModelClient = std::sync::Arc<dyn ModelClient>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tool_choice_defaults_to_auto() {
        assert_eq!(ToolChoice::default(), ToolChoice::Auto);
    }

    #[test]
    fn assistant_turn_without_tool_calls_becomes_text_message() {
        let turn = AssistantTurn {
            content: Some(Content::text("hi")),
            tool_calls: Vec::new(),
            usage: None,
            finish_reason: "stop".to_owned(),
        };
        let msg = turn.into_message();
        assert_eq!(msg.text_content().as_deref(), Some("hi"));
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn assistant_turn_with_tool_calls_preserves_order() {
        let turn = AssistantTurn {
            content: None,
            tool_calls: vec![
                ToolCallRequest::new("call_1", "a", Default::default()),
                ToolCallRequest::new("call_2", "b", Default::default()),
            ],
            usage: None,
            finish_reason: "tool_calls".to_owned(),
        };
        let msg = turn.into_message();
        let calls = msg.tool_calls();
        assert_eq!(calls[0].call_id, "call_1");
        assert_eq!(calls[1].call_id, "call_2");
    }
}
