//! A deterministic in-memory model client for tests (§10.L).
//!
//! Returns a pre-scripted sequence of turns, cycling back to the start once
//! exhausted. No network access, no nondeterminism — the standard fixture
//! for both unit and end-to-end scenario tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ModelError;
use crate::message::{Content, Message, ToolCallRequest};
use crate::model::{AssistantTurn, Delta, DeltaStream, GenerateOptions, ModelClient};
use crate::parser::parse_tool_call_lenient;
use crate::usage::UsageStats;

/// One scripted turn for [`MockModelClient`] to return.
#[derive(Debug, Clone)]
pub enum MockTurn {
    /// A plain-text assistant reply with no tool calls.
    Text(String),
    /// An assistant turn requesting the given tool calls, already in
    /// canonical form.
    ToolCalls(Vec<ToolCallRequest>),
    /// An assistant turn requesting tool calls in raw provider-JSON shape
    /// (§4.E), normalized through [`parse_tool_call_lenient`] exactly as a
    /// real provider adapter would — a malformed entry becomes a request
    /// carrying `argument_decode_error` rather than failing the whole turn.
    RawToolCalls(Vec<Value>),
}

/// A mock [`ModelClient`] that returns predefined responses in sequence,
/// cycling through them once exhausted.
#[derive(Debug)]
pub struct MockModelClient {
    provider_name: String,
    turns: Vec<MockTurn>,
    next: AtomicUsize,
    usage_per_turn: UsageStats,
}

impl MockModelClient {
    /// Builds a mock client that will return `turns` in order, one per
    /// `generate` call, cycling back to the first once exhausted.
    #[must_use]
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            provider_name: "mock".to_owned(),
            turns,
            next: AtomicUsize::new(0),
            usage_per_turn: UsageStats::new(10, 5),
        }
    }

    /// Overrides the per-call usage this client reports.
    #[must_use]
    pub const fn with_usage(mut self, usage: UsageStats) -> Self {
        self.usage_per_turn = usage;
        self
    }

    /// Number of `generate` calls served so far.
    #[must_use]
    pub fn calls_made(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn generate(
        &self,
        _messages: &[Message],
        _options: &GenerateOptions,
    ) -> Result<AssistantTurn, ModelError> {
        if self.turns.is_empty() {
            return Err(ModelError::Permanent("no scripted turns configured".to_owned()));
        }
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let turn = &self.turns[index % self.turns.len()];
        Ok(match turn {
            MockTurn::Text(text) => AssistantTurn {
                content: Some(Content::text(text.clone())),
                tool_calls: Vec::new(),
                usage: Some(self.usage_per_turn),
                finish_reason: "stop".to_owned(),
            },
            MockTurn::ToolCalls(calls) => AssistantTurn {
                content: None,
                tool_calls: calls.clone(),
                usage: Some(self.usage_per_turn),
                finish_reason: "tool_calls".to_owned(),
            },
            MockTurn::RawToolCalls(raw) => AssistantTurn {
                content: None,
                tool_calls: raw.iter().map(parse_tool_call_lenient).collect(),
                usage: Some(self.usage_per_turn),
                finish_reason: "tool_calls".to_owned(),
            },
        })
    }

    async fn count_tokens(&self, messages: &[Message]) -> Result<usize, ModelError> {
        let chars: usize = messages
            .iter()
            .filter_map(Message::text_content)
            .map(|t| t.chars().count())
            .sum();
        Ok(chars.div_ceil(4))
    }
}

/// A mock [`ModelClient`] that genuinely streams (§4.C, §4.H): its single
/// scripted text reply is split into word-sized [`Delta::Text`] fragments
/// before the terminal [`Delta::Done`], so callers that drive
/// `generate_stream` see more than one delta per call. Used to exercise the
/// true-streaming branch of the run controller, as opposed to
/// [`MockModelClient`], which never overrides `supports_streaming` and so
/// only ever exercises the non-streaming fallback.
#[derive(Debug)]
pub struct StreamingMockModelClient {
    provider_name: String,
    reply: String,
    usage: UsageStats,
}

impl StreamingMockModelClient {
    /// Builds a streaming mock that always replies with `reply`, split on
    /// word boundaries into separate deltas.
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            provider_name: "mock-streaming".to_owned(),
            reply: reply.into(),
            usage: UsageStats::new(10, 5),
        }
    }
}

#[async_trait]
impl ModelClient for StreamingMockModelClient {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn generate(
        &self,
        _messages: &[Message],
        _options: &GenerateOptions,
    ) -> Result<AssistantTurn, ModelError> {
        Ok(AssistantTurn {
            content: Some(Content::text(self.reply.clone())),
            tool_calls: Vec::new(),
            usage: Some(self.usage),
            finish_reason: "stop".to_owned(),
        })
    }

    fn generate_stream<'a>(
        &'a self,
        _messages: &'a [Message],
        _options: &'a GenerateOptions,
    ) -> DeltaStream<'a> {
        let words: Vec<String> = self
            .reply
            .split_whitespace()
            .map(ToOwned::to_owned)
            .collect();
        let done = AssistantTurn {
            content: Some(Content::text(self.reply.clone())),
            tool_calls: Vec::new(),
            usage: Some(self.usage),
            finish_reason: "stop".to_owned(),
        };
        let deltas = words
            .into_iter()
            .enumerate()
            .map(|(i, word)| if i == 0 { word } else { format!(" {word}") })
            .map(|chunk| Ok(Delta::Text(chunk)))
            .chain(std::iter::once(Ok(Delta::Done(done))));
        Box::pin(futures::stream::iter(deltas))
    }

    async fn count_tokens(&self, messages: &[Message]) -> Result<usize, ModelError> {
        let chars: usize = messages
            .iter()
            .filter_map(Message::text_content)
            .map(|t| t.chars().count())
            .sum();
        Ok(chars.div_ceil(4))
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn cycles_through_scripted_turns() {
        let client = MockModelClient::new(vec![
            MockTurn::Text("first".to_owned()),
            MockTurn::Text("second".to_owned()),
        ]);
        let options = GenerateOptions::default();

        let r1 = client.generate(&[], &options).await.unwrap();
        assert_eq!(r1.content, Some(Content::text("first")));

        let r2 = client.generate(&[], &options).await.unwrap();
        assert_eq!(r2.content, Some(Content::text("second")));

        let r3 = client.generate(&[], &options).await.unwrap();
        assert_eq!(r3.content, Some(Content::text("first")));
    }

    #[tokio::test]
    async fn raw_tool_calls_with_malformed_arguments_decode_to_an_error_request() {
        let client = MockModelClient::new(vec![MockTurn::RawToolCalls(vec![serde_json::json!({
            "id": "call_1",
            "function": { "name": "echo", "arguments": "{not json" }
        })])]);
        let turn = client.generate(&[], &GenerateOptions::default()).await.unwrap();
        assert_eq!(turn.tool_calls.len(), 1);
        assert!(turn.tool_calls[0].argument_decode_error.is_some());
        assert_eq!(turn.tool_calls[0].name, "echo");
    }

    #[tokio::test]
    async fn emits_scripted_tool_calls() {
        let client = MockModelClient::new(vec![MockTurn::ToolCalls(vec![ToolCallRequest::new(
            "call_1",
            "add",
            Map::new(),
        )])]);
        let turn = client.generate(&[], &GenerateOptions::default()).await.unwrap();
        assert!(turn.has_tool_calls());
        assert_eq!(turn.finish_reason, "tool_calls");
    }

    #[tokio::test]
    async fn streaming_mock_yields_one_delta_per_word_then_a_terminal_done() {
        use futures::StreamExt;

        let client = StreamingMockModelClient::new("hello there friend");
        assert!(client.supports_streaming());

        let mut deltas = client.generate_stream(&[], &GenerateOptions::default());
        let mut texts = Vec::new();
        let mut done = None;
        while let Some(item) = deltas.next().await {
            match item.unwrap() {
                Delta::Text(chunk) => texts.push(chunk),
                Delta::Done(turn) => done = Some(turn),
            }
        }

        assert_eq!(texts, vec!["hello", " there", " friend"]);
        let turn = done.expect("stream must end with a terminal Done delta");
        assert_eq!(turn.content, Some(Content::text("hello there friend")));
    }
}
