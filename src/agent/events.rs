//! Streaming run events (§4.H).

use crate::agent::result::{AgentRunResult, StepResult, ToolCallRecord};

/// One event in the ordered, finite sequence a streaming run yields.
///
/// Total ordering within a run: `StepStarted`, zero or more `Delta`s,
/// `ToolCallStarted`/`ToolCallFinished` pairs (one pair per tool call),
/// `StepFinished`, repeated per step, and finally exactly one
/// `RunFinished`.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RunEvent {
    /// A new Think-Act-Observe iteration has begun.
    StepStarted {
        /// 1-based iteration index.
        step: usize,
    },
    /// A fragment of the current step's Think-phase content.
    Delta {
        /// The text fragment.
        text: String,
    },
    /// A tool call is about to be dispatched.
    ToolCallStarted {
        /// The request's correlation identifier.
        call_id: String,
        /// Name of the tool being invoked.
        tool_name: String,
    },
    /// A tool call has finished, successfully or not.
    ToolCallFinished {
        /// The completed record.
        record: ToolCallRecord,
    },
    /// The current step has finished.
    StepFinished {
        /// The completed step.
        step: StepResult,
    },
    /// The run has finished; this is always the last event.
    RunFinished {
        /// The completed run result.
        result: Box<AgentRunResult>,
    },
}
