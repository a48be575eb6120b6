//! Tool interface and registry (§4.B).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::message::ContentBlock;

/// The outcome of executing one tool call.
///
/// A tool must return this even on failure, with `is_error = true` and at
/// least one text content block describing the condition (§4.B).
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    /// Result content, rendered into the follow-up `ToolResult` message.
    pub content: Vec<ContentBlock>,
    /// Whether this outcome represents a failure.
    pub is_error: bool,
}

impl ToolCallResult {
    /// Builds a successful text outcome.
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// Builds a successful outcome from arbitrary JSON, serialized to text.
    #[must_use]
    pub fn success_json(value: &impl Serialize) -> Self {
        let text = serde_json::to_string(value).unwrap_or_else(|e| e.to_string());
        Self::success(text)
    }

    /// Builds a failed text outcome.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }

    /// Flattens this outcome's content to a single string for display or
    /// for populating a [`crate::agent::result::ToolCallRecord`].
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// The wire form handed to a function-calling LLM (§6):
/// `{"type":"function","function":{name, description, parameters}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// The nested function description.
    pub function: ToolFunctionDefinition,
}

/// The `function` object nested inside a [`ToolDefinition`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunctionDefinition {
    /// Tool name, unique within a registry.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON-Schema (draft 2020-12 subset) describing the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Builds a tool definition from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: "function",
            function: ToolFunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Derives a tool's `input_schema` from a Rust type, rather than hand-writing
/// the JSON-Schema literal (§4.B).
///
/// ```
/// use reagent::tool::tool_schema;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct AddArgs {
///     a: i64,
///     b: i64,
/// }
///
/// let schema = tool_schema::<AddArgs>();
/// assert_eq!(schema["type"], "object");
/// ```
#[must_use]
pub fn tool_schema<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// A tool that can be invoked by name with a JSON arguments object.
///
/// `execute` may suspend on I/O. Implementations MUST NOT let errors
/// propagate as panics; any internal failure should be reported via
/// `Err(ToolError::Execution(..))`, which the step executor folds into an
/// error [`ToolCallResult`] (§4.F, §9 "exceptions in tools → error
/// results").
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// A human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON-Schema describing the shape of `arguments`.
    fn input_schema(&self) -> Value;

    /// Invokes the tool with decoded arguments.
    async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolCallResult, ToolError>;

    /// Builds this tool's wire-form definition.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// A boxed, type-erased [`Tool`].
pub type BoxedTool = Box<dyn Tool>;

/// A name → tool registry built once per agent construction (§4.B).
///
/// Lookup is O(1). Registration of a duplicate name fails with
/// [`ToolError::Duplicate`] and leaves the registry unchanged.
#[derive(Default)]
pub struct ToolBox {
    tools: HashMap<String, BoxedTool>,
}

impl std::fmt::Debug for ToolBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBox")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolBox {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Duplicate`] if a tool with the same name is
    /// already registered; the existing registration is left untouched.
    pub fn register(&mut self, tool: BoxedTool) -> Result<(), ToolError> {
        let name = tool.name().to_owned();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Returns `true` if a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(AsRef::as_ref)
    }

    /// Collects the wire-form definitions of every registered tool, in
    /// unspecified order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Invokes a registered tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if no tool with this name is
    /// registered, or whatever error the tool's `execute` returns.
    pub async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        match self.get(name) {
            Some(tool) => tool.execute(arguments).await,
            None => Err(ToolError::NotFound(name.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn name(&self) -> &str {
            "add"
        }

        fn description(&self) -> &str {
            "Adds two integers."
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "a": {"type": "integer"}, "b": {"type": "integer"} },
                "required": ["a", "b"]
            })
        }

        async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolCallResult, ToolError> {
            let a = arguments.get("a").and_then(Value::as_i64).ok_or_else(|| {
                ToolError::ArgumentDecode("missing `a`".to_owned())
            })?;
            let b = arguments.get("b").and_then(Value::as_i64).ok_or_else(|| {
                ToolError::ArgumentDecode("missing `b`".to_owned())
            })?;
            Ok(ToolCallResult::success_json(&serde_json::json!({ "sum": a + b })))
        }
    }

    #[test]
    fn definition_has_function_wire_shape() {
        let def = AddTool.definition();
        assert_eq!(def.kind, "function");
        assert_eq!(def.function.name, "add");
        assert!(def.function.parameters.is_object());
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut tools = ToolBox::new();
        tools.register(Box::new(AddTool)).unwrap();
        let err = tools.register(Box::new(AddTool)).unwrap_err();
        assert!(matches!(err, ToolError::Duplicate(name) if name == "add"));
        assert_eq!(tools.len(), 1);
    }

    #[tokio::test]
    async fn call_dispatches_to_registered_tool() {
        let mut tools = ToolBox::new();
        tools.register(Box::new(AddTool)).unwrap();

        let mut args = Map::new();
        args.insert("a".to_owned(), Value::from(2));
        args.insert("b".to_owned(), Value::from(3));

        let outcome = tools.call("add", args).await.unwrap();
        assert!(!outcome.is_error);
        assert_eq!(outcome.text(), r#"{"sum":5}"#);
    }

    #[tokio::test]
    async fn call_unknown_tool_returns_not_found() {
        let tools = ToolBox::new();
        let err = tools.call("nope", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "nope"));
    }

    #[test]
    fn tool_schema_derives_object_schema() {
        use schemars::JsonSchema;
        use serde::Deserialize;

        #[derive(Deserialize, JsonSchema)]
        struct Args {
            #[allow(dead_code)]
            a: i64,
            #[allow(dead_code)]
            b: i64,
        }

        let schema = tool_schema::<Args>();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["a"].is_object());
    }
}
