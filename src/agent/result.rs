//! The result/trace model: the single serializable source of truth (§3, §6).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::usage::{AggregatedUsage, UsageStats};

/// How a run ended. Exactly one variant applies to any completed run (P1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The final step had no tool-call requests (natural termination).
    Completed,
    /// `len(steps) == max_iterations` and the last step still requested
    /// tool calls.
    MaxIterationsReached,
    /// A non-tool error terminated the loop; `error` is populated.
    Error,
    /// The run was cancelled via its cancellation handle.
    Cancelled,
}

impl RunStatus {
    /// Whether the run reached a natural, successful conclusion.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// One executed tool call, created exactly once per invocation (§3).
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the invoked tool.
    pub tool_name: String,
    /// The request's stable correlation identifier.
    pub call_id: String,
    /// Decoded arguments the tool was invoked with.
    pub arguments: Map<String, Value>,
    /// Flattened text of the tool's result, under the wire key `result`.
    #[serde(rename = "result")]
    pub result_text: String,
    /// Whether this invocation failed.
    pub is_error: bool,
    /// Wall-clock duration of the invocation, in milliseconds.
    pub duration_ms: f64,
    /// When the invocation completed.
    pub timestamp: DateTime<Utc>,
}

impl ToolCallRecord {
    /// Builds a record for a tool call that was never dispatched because
    /// the name was not registered (§4.F step 3c).
    #[must_use]
    pub fn unknown_tool(call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        let tool_name = tool_name.into();
        Self {
            result_text: format!("unknown tool: {tool_name}"),
            tool_name,
            call_id: call_id.into(),
            arguments: Map::new(),
            is_error: true,
            duration_ms: 0.0,
            timestamp: Utc::now(),
        }
    }
}

/// One Think-Act-Observe iteration's outcome (§3, §4.F). One per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based iteration index.
    pub step: usize,
    /// The assistant's textual content for this step, if any.
    pub thought: Option<String>,
    /// Tool calls executed during this step, in model-emitted order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Token usage reported for this step's LLM call.
    pub usage: Option<UsageStats>,
    /// `stop`, `tool_calls`, or `error`.
    pub finish_reason: String,
}

impl StepResult {
    /// Whether this step requested at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The outcome of one invocation of the run controller: identity, status,
/// the full step trace, and pre-computed aggregates (§3, §6).
///
/// Immutable once the run controller returns. Every field other than the
/// aggregates in `usage`/`tool_calls_total`/`tool_calls_by_name` is
/// derivable from `steps`, but those three are still carried directly so a
/// consumer need not re-walk the trace (invariant 9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunResult {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    /// The agent's configured name.
    pub agent_name: String,
    /// The final answer text, or an empty string if none was produced.
    pub output: String,
    /// The terminal status.
    pub status: RunStatus,
    /// Every step taken, in order, 1-indexed and contiguous.
    pub steps: Vec<StepResult>,
    /// Token usage summed across every step.
    pub usage: AggregatedUsage,
    /// Total number of tool calls executed across the run.
    pub tool_calls_total: usize,
    /// Count of tool calls executed, grouped by tool name.
    pub tool_calls_by_name: BTreeMap<String, usize>,
    /// When the run began.
    pub start_time: DateTime<Utc>,
    /// When the run ended.
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time`, in seconds.
    pub duration_seconds: f64,
    /// Populated iff `status == Error`.
    pub error: Option<String>,
    /// The `max_iterations` budget this run was constructed with.
    pub max_iterations: usize,
}

impl AgentRunResult {
    /// Computes `tool_calls_total` and `tool_calls_by_name` from `steps`
    /// (invariant 4).
    #[must_use]
    pub fn tool_call_counts(steps: &[StepResult]) -> (usize, BTreeMap<String, usize>) {
        let mut by_name: BTreeMap<String, usize> = BTreeMap::new();
        let mut total = 0usize;
        for step in steps {
            for call in &step.tool_calls {
                total += 1;
                *by_name.entry(call.tool_name.clone()).or_insert(0) += 1;
            }
        }
        (total, by_name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_step(step: usize, tool_calls: Vec<ToolCallRecord>, finish_reason: &str) -> StepResult {
        StepResult {
            step,
            thought: None,
            tool_calls,
            usage: Some(UsageStats::new(10, 5)),
            finish_reason: finish_reason.to_owned(),
        }
    }

    #[test]
    fn tool_call_counts_matches_invariant_4() {
        let steps = vec![
            sample_step(
                1,
                vec![
                    ToolCallRecord {
                        tool_name: "add".to_owned(),
                        call_id: "c1".to_owned(),
                        arguments: Map::new(),
                        result_text: "5".to_owned(),
                        is_error: false,
                        duration_ms: 1.0,
                        timestamp: Utc::now(),
                    },
                    ToolCallRecord {
                        tool_name: "add".to_owned(),
                        call_id: "c2".to_owned(),
                        arguments: Map::new(),
                        result_text: "5".to_owned(),
                        is_error: false,
                        duration_ms: 1.0,
                        timestamp: Utc::now(),
                    },
                ],
                "tool_calls",
            ),
            sample_step(2, vec![], "stop"),
        ];
        let (total, by_name) = AgentRunResult::tool_call_counts(&steps);
        assert_eq!(total, 2);
        assert_eq!(by_name.get("add"), Some(&2));
    }

    #[test]
    fn canonical_json_round_trips() {
        let result = AgentRunResult {
            run_id: Uuid::new_v4(),
            agent_name: "agent".to_owned(),
            output: "Hello!".to_owned(),
            status: RunStatus::Completed,
            steps: vec![sample_step(1, vec![], "stop")],
            usage: UsageStats::new(10, 5),
            tool_calls_total: 0,
            tool_calls_by_name: BTreeMap::new(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            duration_seconds: 0.01,
            error: None,
            max_iterations: 10,
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: AgentRunResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
        let reencoded = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, reencoded);
    }

    #[test]
    fn tool_call_record_uses_result_wire_key() {
        let record = ToolCallRecord {
            tool_name: "add".to_owned(),
            call_id: "c1".to_owned(),
            arguments: Map::new(),
            result_text: "5".to_owned(),
            is_error: false,
            duration_ms: 2.5,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["result"], "5");
        assert!(json.get("result_text").is_none());
    }

    #[test]
    fn unknown_tool_record_is_marked_error() {
        let record = ToolCallRecord::unknown_tool("c1", "nope");
        assert!(record.is_error);
        assert_eq!(record.result_text, "unknown tool: nope");
    }
}
