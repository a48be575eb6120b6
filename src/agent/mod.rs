//! The agent: a named bundle of a model client, tool registry, and run
//! configuration, plus the run controller that drives it (§4.G, §6).

pub mod cancellation;
pub mod config;
pub mod events;
pub mod executor;
pub mod result;
pub mod runner;

use futures::Stream;

use crate::model::SharedModelClient;
use crate::tool::{BoxedTool, ToolBox};

pub use cancellation::CancellationToken;
pub use config::RunConfig;
pub use events::RunEvent;
pub use result::{AgentRunResult, RunStatus, StepResult, ToolCallRecord};

/// A configured agent: a model client, a tool registry, and a run
/// configuration, ready to drive the Think-Act-Observe loop (§3, §4.G).
///
/// Cheaply constructed via [`Agent::builder`]. An `Agent` itself holds no
/// mutable run state; every call to [`Agent::run`] (or its cancellable or
/// streaming counterparts) starts a fresh [`crate::memory::ConversationMemory`]
/// and is independent of any other concurrent call against the same `Agent`
/// (§5: "two concurrent runs against the same `Agent` share no mutable
/// state other than the model client's connection pool").
pub struct Agent {
    name: String,
    system_prompt: Option<String>,
    model: SharedModelClient,
    tools: ToolBox,
    config: RunConfig,
}

impl Agent {
    /// Starts building a new agent with the given name.
    #[must_use]
    pub fn builder(name: impl Into<String>, model: SharedModelClient) -> AgentBuilder {
        AgentBuilder::new(name, model)
    }

    /// The agent's configured name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The agent's tool registry.
    #[must_use]
    pub const fn tools(&self) -> &ToolBox {
        &self.tools
    }

    /// The agent's run configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs this agent to completion against `user_input`.
    pub async fn run(&self, user_input: &str) -> AgentRunResult {
        runner::run(
            &self.name,
            self.system_prompt.as_deref(),
            user_input,
            self.model.as_ref(),
            &self.tools,
            &self.config,
        )
        .await
    }

    /// As [`Agent::run`], but stops at the next step boundary once `cancel`
    /// is signaled.
    pub async fn run_cancellable(
        &self,
        user_input: &str,
        cancel: &CancellationToken,
    ) -> AgentRunResult {
        runner::run_cancellable(
            &self.name,
            self.system_prompt.as_deref(),
            user_input,
            self.model.as_ref(),
            &self.tools,
            &self.config,
            cancel,
        )
        .await
    }

    /// Runs this agent, yielding a [`RunEvent`] per notable occurrence
    /// rather than only the final result (§4.H).
    pub fn run_stream<'a>(
        &'a self,
        user_input: &'a str,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = RunEvent> + 'a {
        runner::run_stream(
            &self.name,
            self.system_prompt.as_deref(),
            user_input,
            self.model.as_ref(),
            &self.tools,
            &self.config,
            cancel,
        )
    }
}

/// Fluent builder for [`Agent`] (§6).
pub struct AgentBuilder {
    name: String,
    system_prompt: Option<String>,
    model: SharedModelClient,
    tools: ToolBox,
    config: RunConfig,
}

impl AgentBuilder {
    fn new(name: impl Into<String>, model: SharedModelClient) -> Self {
        Self {
            name: name.into(),
            system_prompt: None,
            model,
            tools: ToolBox::new(),
            config: RunConfig::default(),
        }
    }

    /// Sets the system prompt seeded at the start of every run.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers one tool.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ToolError::Duplicate`] if a tool by the same
    /// name has already been registered on this builder.
    pub fn tool(mut self, tool: BoxedTool) -> Result<Self, crate::error::ToolError> {
        self.tools.register(tool)?;
        Ok(self)
    }

    /// Replaces the run configuration wholesale.
    #[must_use]
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Finishes construction.
    #[must_use]
    pub fn build(self) -> Agent {
        Agent {
            name: self.name,
            system_prompt: self.system_prompt,
            model: self.model,
            tools: self.tools,
            config: self.config,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockModelClient, MockTurn};
    use std::sync::Arc;

    #[tokio::test]
    async fn builder_produces_a_working_agent() {
        let model = Arc::new(MockModelClient::new(vec![MockTurn::Text("hi".to_owned())]));
        let agent = Agent::builder("assistant", model)
            .system_prompt("be terse")
            .config(RunConfig::default().with_max_iterations(2))
            .build();

        let result = agent.run("hello").await;

        assert_eq!(agent.name(), "assistant");
        assert_eq!(result.agent_name, "assistant");
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.output, "hi");
    }

    #[tokio::test]
    async fn builder_rejects_duplicate_tool_names() {
        use crate::error::ToolError;
        use crate::tool::{Tool, ToolCallResult};
        use async_trait::async_trait;
        use serde_json::{Map, Value};

        struct NoopTool;

        #[async_trait]
        impl Tool for NoopTool {
            fn name(&self) -> &str {
                "noop"
            }
            fn description(&self) -> &str {
                "does nothing"
            }
            fn input_schema(&self) -> Value {
                serde_json::json!({"type": "object"})
            }
            async fn execute(&self, _arguments: Map<String, Value>) -> Result<ToolCallResult, ToolError> {
                Ok(ToolCallResult::success(""))
            }
        }

        let model = Arc::new(MockModelClient::new(vec![MockTurn::Text("ok".to_owned())]));
        let builder = Agent::builder("a", model).tool(Box::new(NoopTool)).unwrap();
        let err = builder.tool(Box::new(NoopTool)).unwrap_err();
        assert!(matches!(err, ToolError::Duplicate(name) if name == "noop"));
    }
}
