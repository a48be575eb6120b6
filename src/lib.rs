//! A runtime for autonomous reasoning agents: drive an LLM through a
//! Think-Act-Observe loop, dispatch the tool calls it requests, and
//! return a fully typed, serializable trace of what happened.
//!
//! The core loop lives in [`agent::runner`]; [`agent::executor`] performs a
//! single Think-Act-Observe iteration. [`model::ModelClient`] is the
//! provider boundary, [`tool::Tool`] is the tool boundary, and
//! [`agent::result::AgentRunResult`] is the single serializable source of
//! truth a run produces.
//!
//! ```no_run
//! use std::sync::Arc;
//! use reagent::agent::Agent;
//! use reagent::providers::mock::{MockModelClient, MockTurn};
//!
//! # async fn run() {
//! let model = Arc::new(MockModelClient::new(vec![MockTurn::Text("Hi there.".to_owned())]));
//! let agent = Agent::builder("assistant", model).build();
//! let result = agent.run("Hello!").await;
//! assert!(result.status.is_completed());
//! # }
//! ```

pub mod agent;
pub mod error;
pub mod memory;
pub mod message;
pub mod model;
pub mod parser;
pub mod providers;
pub mod tool;
pub mod usage;

pub mod prelude {
    //! Commonly used types, for a single glob import.

    pub use crate::agent::{Agent, AgentBuilder, AgentRunResult, CancellationToken, RunConfig, RunEvent, RunStatus};
    pub use crate::error::RunError;
    pub use crate::memory::ConversationMemory;
    pub use crate::message::{Content, ContentBlock, Message, ToolCallRequest};
    pub use crate::model::{GenerateOptions, ModelClient, SharedModelClient, ToolChoice};
    pub use crate::tool::{Tool, ToolBox, ToolCallResult, ToolDefinition};
}
