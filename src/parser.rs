//! The tool-call parser (§4.E).
//!
//! This is the one place in the engine that knows any provider's tool-call
//! shape. Every other component consumes the normalized
//! [`crate::message::ToolCallRequest`] this module produces.
//!
//! Per the design notes (§9), the historical approach of duck-typing a
//! dynamic object is replaced with an explicit tagged sum type
//! ([`RawToolCall`]) decoded once, here.

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ToolError;
use crate::message::ToolCallRequest;

/// The function-calling convention: `{id, function: {name, arguments}}`.
#[derive(Debug, Deserialize)]
struct RawFunctionCall {
    #[serde(default)]
    id: Option<String>,
    function: RawFunction,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: String,
    #[serde(default)]
    arguments: RawArguments,
}

/// `arguments` may arrive as a JSON-encoded string or as an inline object;
/// both are provider-observed shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawArguments {
    String(String),
    Object(Map<String, Value>),
    Missing,
}

impl Default for RawArguments {
    fn default() -> Self {
        Self::Missing
    }
}

/// The MCP convention: `{name, input: {..}}`.
#[derive(Debug, Deserialize)]
struct RawMcpCall {
    name: String,
    #[serde(default)]
    input: Map<String, Value>,
}

/// Every tool-call shape this engine accepts as input, tagged so the
/// decoder never has to sniff ad hoc fields (§9).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawToolCall {
    /// Already in canonical `(call_id, name, arguments)` form.
    Canonical(ToolCallRequest),
    /// OpenAI-style function-calling convention.
    FunctionCall(RawFunctionCall),
    /// MCP-style convention.
    Mcp(RawMcpCall),
}

/// Parses one raw tool-call value (in any recognized provider shape) into a
/// canonical [`ToolCallRequest`].
///
/// If `call_id` is absent, a stable identifier of the form `tc_<uuid>` is
/// synthesized. If `arguments` is a JSON string that fails to decode, this
/// returns [`ToolError::ArgumentDecode`] — the caller (the step executor)
/// is expected to record that as an error result and continue the loop
/// rather than abort the run (§4.E).
///
/// # Errors
///
/// Returns [`ToolError::ArgumentDecode`] if the raw value does not match
/// any recognized shape, or if a JSON-string `arguments` field fails to
/// parse.
pub fn parse_tool_call(raw: &Value) -> Result<ToolCallRequest, ToolError> {
    let parsed: RawToolCall = serde_json::from_value(raw.clone()).map_err(|e| {
        ToolError::ArgumentDecode(format!("unrecognized tool-call shape: {e}"))
    })?;

    match parsed {
        RawToolCall::Canonical(request) => Ok(request),
        RawToolCall::FunctionCall(call) => {
            let call_id = call.id.unwrap_or_else(synthesize_call_id);
            let arguments = match call.function.arguments {
                RawArguments::Object(map) => map,
                RawArguments::Missing => Map::new(),
                RawArguments::String(s) => serde_json::from_str(&s).map_err(|e| {
                    ToolError::ArgumentDecode(format!("invalid JSON arguments: {e}"))
                })?,
            };
            Ok(ToolCallRequest::new(call_id, call.function.name, arguments))
        }
        RawToolCall::Mcp(call) => Ok(ToolCallRequest::new(synthesize_call_id(), call.name, call.input)),
    }
}

fn synthesize_call_id() -> String {
    format!("tc_{}", Uuid::new_v4())
}

/// As [`parse_tool_call`], but never fails: a decode error is folded into
/// the returned request's `argument_decode_error` field instead of
/// propagated (§4.E, §9 "the loop continues so the LLM can self-correct").
///
/// This is what a provider adapter calls when normalizing a whole turn's
/// worth of raw tool-call entries — one entry failing to decode must not
/// stop the others from reaching the step executor.
#[must_use]
pub fn parse_tool_call_lenient(raw: &Value) -> ToolCallRequest {
    match parse_tool_call(raw) {
        Ok(request) => request,
        Err(err) => {
            let call_id = raw
                .get("call_id")
                .or_else(|| raw.get("id"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or_else(synthesize_call_id);
            let name = raw
                .get("name")
                .or_else(|| raw.get("function").and_then(|f| f.get("name")))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| "unknown".to_owned());
            ToolCallRequest::with_decode_error(call_id, name, err.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_shape() {
        let raw = serde_json::json!({
            "call_id": "call_1",
            "name": "add",
            "arguments": {"a": 2, "b": 3}
        });
        let req = parse_tool_call(&raw).unwrap();
        assert_eq!(req.call_id, "call_1");
        assert_eq!(req.name, "add");
    }

    #[test]
    fn parses_function_calling_shape_with_string_arguments() {
        let raw = serde_json::json!({
            "id": "call_abc",
            "function": { "name": "add", "arguments": "{\"a\":2,\"b\":3}" }
        });
        let req = parse_tool_call(&raw).unwrap();
        assert_eq!(req.call_id, "call_abc");
        assert_eq!(req.name, "add");
        assert_eq!(req.arguments.get("a").and_then(Value::as_i64), Some(2));
    }

    #[test]
    fn parses_function_calling_shape_with_object_arguments() {
        let raw = serde_json::json!({
            "id": "call_abc",
            "function": { "name": "add", "arguments": {"a": 2, "b": 3} }
        });
        let req = parse_tool_call(&raw).unwrap();
        assert_eq!(req.arguments.get("b").and_then(Value::as_i64), Some(3));
    }

    #[test]
    fn synthesizes_call_id_when_absent() {
        let raw = serde_json::json!({
            "function": { "name": "add", "arguments": {} }
        });
        let req = parse_tool_call(&raw).unwrap();
        assert!(req.call_id.starts_with("tc_"));
    }

    #[test]
    fn parses_mcp_shape() {
        let raw = serde_json::json!({
            "name": "search",
            "input": {"query": "rust"}
        });
        let req = parse_tool_call(&raw).unwrap();
        assert_eq!(req.name, "search");
        assert_eq!(req.arguments.get("query").and_then(Value::as_str), Some("rust"));
        assert!(req.call_id.starts_with("tc_"));
    }

    #[test]
    fn malformed_arguments_string_is_argument_decode_error() {
        let raw = serde_json::json!({
            "id": "call_1",
            "function": { "name": "echo", "arguments": "{not json" }
        });
        let err = parse_tool_call(&raw).unwrap_err();
        assert!(matches!(err, ToolError::ArgumentDecode(_)));
    }

    #[test]
    fn lenient_parse_preserves_call_id_and_name_on_decode_failure() {
        let raw = serde_json::json!({
            "id": "call_1",
            "function": { "name": "echo", "arguments": "{not json" }
        });
        let req = parse_tool_call_lenient(&raw);
        assert_eq!(req.call_id, "call_1");
        assert_eq!(req.name, "echo");
        assert!(req.argument_decode_error.is_some());
        assert!(req.arguments.is_empty());
    }

    #[test]
    fn lenient_parse_passes_through_well_formed_calls() {
        let raw = serde_json::json!({
            "id": "call_1",
            "function": { "name": "add", "arguments": {"a": 1} }
        });
        let req = parse_tool_call_lenient(&raw);
        assert!(req.argument_decode_error.is_none());
        assert_eq!(req.name, "add");
    }
}
