//! The step executor: one Think-Act-Observe iteration (§4.F).

use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info_span, instrument, warn, Instrument};

use crate::agent::config::RunConfig;
use crate::agent::result::{StepResult, ToolCallRecord};
use crate::error::RunError;
use crate::memory::ConversationMemory;
use crate::message::{ContentBlock, Message, ToolCallRequest};
use crate::model::{GenerateOptions, ModelClient};
use crate::tool::ToolBox;

/// Performs exactly one Think-Act-Observe iteration.
///
/// On success, the assistant message and every resulting tool-result
/// message have already been appended to `memory`, in causal order
/// (§5: "messages append to memory in the exact causal order of the
/// protocol").
///
/// # Errors
///
/// Returns [`RunError::Model`] if the model client reports a failure; this
/// is the only way this function can fail. Tool-level failures are always
/// folded into an error [`ToolCallRecord`] and never returned as an `Err`
/// (§4.F, §9).
#[instrument(skip(memory, tools, model, config), fields(step = step_index))]
pub async fn execute_step(
    memory: &mut ConversationMemory,
    tools: &ToolBox,
    model: &dyn ModelClient,
    config: &RunConfig,
    step_index: usize,
) -> Result<StepResult, RunError> {
    // 1. Think.
    let options = build_generate_options(tools, config);
    let model_span = info_span!("model_call", provider = model.provider_name());
    let turn = async { model.generate(memory.snapshot(), &options).await }
        .instrument(model_span)
        .await
        .map_err(RunError::Model)?;

    let thought = turn.content.as_ref().map(|c| c.flatten_to_text());
    let usage = turn.usage;
    let has_tool_calls = turn.has_tool_calls();
    memory.append(turn.into_message());

    // 2. Decide: no tool calls requested (or `tool_choice = required` with
    //    none emitted, per the resolved open question) is natural
    //    completion.
    if !has_tool_calls {
        debug!(finish_reason = "stop", "step finished");
        return Ok(StepResult {
            step: step_index,
            thought,
            tool_calls: Vec::new(),
            usage,
            finish_reason: "stop".to_owned(),
        });
    }

    let last_message = memory
        .snapshot()
        .last()
        .expect("assistant message was just appended");
    let requests = last_message.tool_calls().to_vec();

    // 3-4. Act, honoring `parallel_tool_calls` while preserving
    //    model-emitted order in both the memory log and `StepResult`.
    let timeout = Duration::from_secs_f64(config.per_tool_timeout_seconds.max(0.0));
    let outcomes = execute_tool_calls(tools, &requests, timeout, config.parallel_tool_calls).await;

    let mut tool_calls = Vec::with_capacity(outcomes.len());
    for (record, message) in outcomes {
        memory.append(message);
        tool_calls.push(record);
    }

    debug!(finish_reason = "tool_calls", "step finished");
    Ok(StepResult {
        step: step_index,
        thought,
        tool_calls,
        usage,
        finish_reason: "tool_calls".to_owned(),
    })
}

/// Builds the `tools`/`tool_choice` options passed to every `generate` call
/// a Think phase makes, whether driven by [`execute_step`] or by the
/// streaming run controller's own inline Think phase (§4.G, §4.H).
pub(crate) fn build_generate_options(tools: &ToolBox, config: &RunConfig) -> GenerateOptions {
    GenerateOptions {
        tools: tools.definitions(),
        tool_choice: config.tool_choice.clone(),
    }
}

/// Executes every tool-call request in `requests`, honoring `parallel`
/// while always collating outcomes back into the model-emitted order
/// before returning (§4.F step 4, §5's ordering guarantee).
///
/// Shared between [`execute_step`] and the streaming run controller's Act
/// phase, which always passes `parallel = false` so its `ToolCallStarted`/
/// `ToolCallFinished` events have an unambiguous order (§4.H).
pub(crate) async fn execute_tool_calls(
    tools: &ToolBox,
    requests: &[ToolCallRequest],
    timeout: Duration,
    parallel: bool,
) -> Vec<(ToolCallRecord, Message)> {
    if parallel {
        join_all(requests.iter().map(|request| execute_one(tools, request, timeout))).await
    } else {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(execute_one(tools, request, timeout).await);
        }
        outcomes
    }
}

/// Executes a single tool call, converting any failure or timeout into an
/// error result rather than propagating it (§4.F step 3, §9).
async fn execute_one(
    tools: &ToolBox,
    request: &ToolCallRequest,
    timeout: Duration,
) -> (ToolCallRecord, Message) {
    let span = info_span!("tool_call", tool_name = %request.name, call_id = %request.call_id);
    execute_one_inner(tools, request, timeout).instrument(span).await
}

async fn execute_one_inner(
    tools: &ToolBox,
    request: &ToolCallRequest,
    timeout: Duration,
) -> (ToolCallRecord, Message) {
    let start = Instant::now();

    if let Some(reason) = &request.argument_decode_error {
        warn!(tool = %request.name, call_id = %request.call_id, "argument decode error");
        let record = ToolCallRecord {
            tool_name: request.name.clone(),
            call_id: request.call_id.clone(),
            arguments: request.arguments.clone(),
            result_text: format!("argument decode error: {reason}"),
            is_error: true,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
        };
        let message = Message::tool_result(
            request.call_id.clone(),
            vec![ContentBlock::text(record.result_text.clone())],
            true,
        );
        return (record, message);
    }

    if !tools.contains(&request.name) {
        warn!(tool = %request.name, "unknown tool requested");
        let record = ToolCallRecord::unknown_tool(request.call_id.clone(), request.name.clone());
        let message = Message::tool_result(
            request.call_id.clone(),
            vec![ContentBlock::text(record.result_text.clone())],
            true,
        );
        return (record, message);
    }

    let call = tools.call(&request.name, request.arguments.clone());
    let (result_text, content, is_error) = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(outcome)) => {
            debug!(tool = %request.name, call_id = %request.call_id, "tool call succeeded");
            (outcome.text(), outcome.content, outcome.is_error)
        }
        Ok(Err(tool_error)) => {
            warn!(tool = %request.name, error = %tool_error, "tool call failed");
            let text = tool_error.to_string();
            (text.clone(), vec![ContentBlock::text(text)], true)
        }
        Err(_elapsed) => {
            let text = format!("tool timed out after {:.1}s", timeout.as_secs_f64());
            warn!(tool = %request.name, call_id = %request.call_id, "{text}");
            (text.clone(), vec![ContentBlock::text(text)], true)
        }
    };

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    debug!(is_error, duration_ms, "tool call finished");
    let record = ToolCallRecord {
        tool_name: request.name.clone(),
        call_id: request.call_id.clone(),
        arguments: request.arguments.clone(),
        result_text,
        is_error,
        duration_ms,
        timestamp: Utc::now(),
    };
    let message = Message::tool_result(request.call_id.clone(), content, is_error);
    (record, message)
}
