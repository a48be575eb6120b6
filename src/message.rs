//! The typed conversation message model (§3, §4.A).
//!
//! A [`Message`] is a tagged sum type discriminated by role. Every variant
//! carries a stable identifier, a UTC timestamp, and free-form metadata.
//! Messages are immutable once built; [`crate::memory::ConversationMemory`]
//! only ever appends them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::MessageError;

/// A single content fragment making up a multimodal message or tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text itself.
        text: String,
    },
    /// An inline base64-encoded image.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type, e.g. `image/png`.
        mime_type: String,
    },
    /// A reference to an external resource.
    Resource {
        /// URI of the resource.
        uri: String,
        /// Optional inline text representation.
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl ContentBlock {
    /// Builds a text content block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Builds an image content block.
    #[must_use]
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Builds a resource content block.
    #[must_use]
    pub fn resource(uri: impl Into<String>, text: Option<String>) -> Self {
        Self::Resource {
            uri: uri.into(),
            text,
        }
    }

    /// Returns the text of this block, if it carries any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Resource { text, .. } => text.as_deref(),
            Self::Image { .. } => None,
        }
    }
}

/// Textual or multimodal content: either a bare string or an ordered
/// sequence of [`ContentBlock`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text shorthand, the common case.
    Text(String),
    /// An ordered sequence of content blocks.
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Builds plain text content.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Flattens this content down to a single string, concatenating the
    /// text of every block (images and resources without inline text
    /// contribute nothing).
    #[must_use]
    pub fn flatten_to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// One tool invocation request emitted by the model: a stable `call_id`,
/// the tool `name`, and arguments as a key-value mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Stable identifier correlating this request with its eventual result.
    pub call_id: String,
    /// Name of the tool being invoked.
    pub name: String,
    /// Decoded arguments. Empty when `argument_decode_error` is present.
    pub arguments: Map<String, Value>,
    /// Set when the provider's raw arguments payload for this request
    /// failed to decode (§4.E). When present, the step executor records an
    /// error result carrying this text without dispatching the tool, and
    /// the run continues so the model can self-correct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_decode_error: Option<String>,
}

impl ToolCallRequest {
    /// Builds a new, successfully decoded tool-call request.
    #[must_use]
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
            argument_decode_error: None,
        }
    }

    /// Builds a request whose arguments could not be decoded (§4.E). Carries
    /// no arguments; the step executor folds `reason` into an error result
    /// instead of dispatching the tool.
    #[must_use]
    pub fn with_decode_error(
        call_id: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: Map::new(),
            argument_decode_error: Some(reason.into()),
        }
    }
}

/// Metadata map attached to every message.
pub type Metadata = BTreeMap<String, Value>;

/// A single turn in the conversation, discriminated by role (§3, §4.A).
///
/// Every variant carries a unique `id`, a UTC `created_at` timestamp, and a
/// free-form `metadata` map; accessors below expose these uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Message {
    /// Instructions set once at the start of a run.
    System {
        /// Unique message identifier.
        id: Uuid,
        /// Creation timestamp.
        created_at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default)]
        metadata: Metadata,
        /// Instruction content.
        content: Content,
    },
    /// Input from the end user.
    User {
        /// Unique message identifier.
        id: Uuid,
        /// Creation timestamp.
        created_at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default)]
        metadata: Metadata,
        /// User-provided content.
        content: Content,
        /// Optional identifier of the originating user.
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    /// The model's turn.
    Assistant {
        /// Unique message identifier.
        id: Uuid,
        /// Creation timestamp.
        created_at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default)]
        metadata: Metadata,
        /// Optional textual content.
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<Content>,
        /// Tool-call requests emitted alongside or instead of content.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
        /// Token usage for this turn, if reported.
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<crate::usage::UsageStats>,
        /// The model's stated reason for ending its turn.
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
    /// A standalone representation of a single tool-call request, used by
    /// the parser (§4.E) and provider adapters when a request must be
    /// carried independent of an enclosing assistant turn.
    ToolCall {
        /// Unique message identifier.
        id: Uuid,
        /// Creation timestamp.
        created_at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default)]
        metadata: Metadata,
        /// The normalized request.
        request: ToolCallRequest,
    },
    /// The result of executing one tool call.
    ToolResult {
        /// Unique message identifier.
        id: Uuid,
        /// Creation timestamp.
        created_at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default)]
        metadata: Metadata,
        /// The `call_id` of the request this result answers.
        call_id: String,
        /// Result content blocks.
        content: Vec<ContentBlock>,
        /// Whether execution failed.
        is_error: bool,
    },
}

impl Message {
    /// Builds a system message.
    #[must_use]
    pub fn system(content: impl Into<Content>) -> Self {
        Self::System {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            metadata: Metadata::new(),
            content: content.into(),
        }
    }

    /// Builds a user message.
    #[must_use]
    pub fn user(content: impl Into<Content>) -> Self {
        Self::User {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            metadata: Metadata::new(),
            content: content.into(),
            user_id: None,
        }
    }

    /// Builds an assistant message carrying only text content.
    #[must_use]
    pub fn assistant_text(content: impl Into<Content>) -> Self {
        Self::Assistant {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            metadata: Metadata::new(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        }
    }

    /// Builds an assistant message carrying tool-call requests.
    #[must_use]
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            metadata: Metadata::new(),
            content: None,
            tool_calls,
            usage: None,
            finish_reason: Some("tool_calls".to_owned()),
        }
    }

    /// Builds a tool-result message.
    #[must_use]
    pub fn tool_result(
        call_id: impl Into<String>,
        content: Vec<ContentBlock>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            metadata: Metadata::new(),
            call_id: call_id.into(),
            content,
            is_error,
        }
    }

    /// The message's unique identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::System { id, .. }
            | Self::User { id, .. }
            | Self::Assistant { id, .. }
            | Self::ToolCall { id, .. }
            | Self::ToolResult { id, .. } => *id,
        }
    }

    /// The message's creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::System { created_at, .. }
            | Self::User { created_at, .. }
            | Self::Assistant { created_at, .. }
            | Self::ToolCall { created_at, .. }
            | Self::ToolResult { created_at, .. } => *created_at,
        }
    }

    /// The tool-call requests carried by an assistant message, or an empty
    /// slice for every other variant.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Whether this message is an assistant turn with at least one
    /// tool-call request.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Flattens this message's content to plain text, if it has any.
    #[must_use]
    pub fn text_content(&self) -> Option<String> {
        match self {
            Self::System { content, .. } | Self::User { content, .. } => {
                Some(content.flatten_to_text())
            }
            Self::Assistant { content, .. } => content.as_ref().map(Content::flatten_to_text),
            Self::ToolCall { .. } | Self::ToolResult { .. } => None,
        }
    }

    /// Decodes a message from its wire-form JSON representation.
    ///
    /// This is lossy-but-sufficient in the direction storage-form →
    /// wire-form → storage-form: identifiers and timestamps that are absent
    /// from the wire payload are synthesized on ingest.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] if the payload has no recognizable role tag
    /// or a malformed shape.
    pub fn decode_wire(value: &Value) -> Result<Self, MessageError> {
        let obj = value
            .as_object()
            .ok_or_else(|| MessageError::InvalidJson("expected a JSON object".to_owned()))?;

        let role = obj
            .get("role")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingRole)?;

        match role {
            "system" => Ok(Self::system(Content::text(text_field(obj, "content")?))),
            "user" => Ok(Self::user(Content::text(text_field(obj, "content")?))),
            "assistant" => decode_wire_assistant(obj),
            "tool" => decode_wire_tool_result(obj),
            other => Err(MessageError::MalformedContent {
                reason: format!("unrecognized role: {other}"),
            }),
        }
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Result<String, MessageError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| MessageError::MalformedContent {
            reason: format!("missing or non-string `{key}`"),
        })
}

fn decode_wire_assistant(obj: &Map<String, Value>) -> Result<Message, MessageError> {
    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .map(|s| Content::text(s.to_owned()));

    let tool_calls = match obj.get("tool_calls") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(decode_wire_tool_call)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(MessageError::MalformedToolCall {
                reason: "`tool_calls` must be an array".to_owned(),
            });
        }
    };

    Ok(Message::Assistant {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        metadata: Metadata::new(),
        content,
        tool_calls,
        usage: None,
        finish_reason: obj
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
    })
}

fn decode_wire_tool_call(value: &Value) -> Result<ToolCallRequest, MessageError> {
    let obj = value.as_object().ok_or_else(|| MessageError::MalformedToolCall {
        reason: "tool_call entry must be an object".to_owned(),
    })?;
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("tc_{}", Uuid::new_v4()));
    let function = obj.get("function").and_then(Value::as_object).ok_or_else(|| {
        MessageError::MalformedToolCall {
            reason: "missing `function` object".to_owned(),
        }
    })?;
    let name = text_field(function, "name").map_err(|_| MessageError::MalformedToolCall {
        reason: "missing `function.name`".to_owned(),
    })?;
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => serde_json::from_str(s).map_err(|e| {
            MessageError::MalformedToolCall {
                reason: format!("invalid JSON arguments string: {e}"),
            }
        })?,
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    Ok(ToolCallRequest::new(id, name, arguments))
}

fn decode_wire_tool_result(obj: &Map<String, Value>) -> Result<Message, MessageError> {
    let call_id = text_field(obj, "tool_call_id").map_err(|_| MessageError::MalformedContent {
        reason: "missing `tool_call_id`".to_owned(),
    })?;
    let text = text_field(obj, "content")?;
    Ok(Message::tool_result(call_id, vec![ContentBlock::text(text)], false))
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn system_message_has_role_tag() {
        let msg = Message::system("be helpful");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
    }

    #[test]
    fn assistant_tool_calls_round_trip() {
        let req = ToolCallRequest::new("call_1", "add", {
            let mut m = Map::new();
            m.insert("a".to_owned(), Value::from(2));
            m.insert("b".to_owned(), Value::from(3));
            m
        });
        let msg = Message::assistant_tool_calls(vec![req.clone()]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls(), &[req]);

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = Message::tool_result("call_1", vec![ContentBlock::text("5")], false);
        if let Message::ToolResult { call_id, is_error, .. } = &msg {
            assert_eq!(call_id, "call_1");
            assert!(!is_error);
        } else {
            panic!("expected ToolResult");
        }
    }

    #[test]
    fn decode_wire_function_calling_shape() {
        let value = serde_json::json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": { "name": "add", "arguments": "{\"a\":2,\"b\":3}" }
            }]
        });
        let msg = Message::decode_wire(&value).unwrap();
        assert_eq!(msg.tool_calls().len(), 1);
        assert_eq!(msg.tool_calls()[0].name, "add");
        assert_eq!(msg.tool_calls()[0].call_id, "call_abc");
    }

    #[test]
    fn decode_wire_rejects_missing_role() {
        let value = serde_json::json!({ "content": "hi" });
        assert!(matches!(
            Message::decode_wire(&value),
            Err(MessageError::MissingRole)
        ));
    }

    #[test]
    fn decode_wire_rejects_malformed_tool_call_arguments() {
        let value = serde_json::json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "call_1",
                "function": { "name": "echo", "arguments": "{not json" }
            }]
        });
        assert!(Message::decode_wire(&value).is_err());
    }

    #[test]
    fn content_flatten_concatenates_text_blocks() {
        let content = Content::Blocks(vec![
            ContentBlock::text("a"),
            ContentBlock::image("xx", "image/png"),
            ContentBlock::text("b"),
        ]);
        assert_eq!(content.flatten_to_text(), "ab");
    }
}
