//! The run controller: owns the Think-Act-Observe loop across steps and
//! produces the final [`AgentRunResult`] (§4.G, §4.H).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_stream::stream;
use chrono::Utc;
use futures::stream::Stream;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use futures::StreamExt;

use crate::agent::cancellation::CancellationToken;
use crate::agent::config::RunConfig;
use crate::agent::events::RunEvent;
use crate::agent::executor::{build_generate_options, execute_step, execute_tool_calls};
use crate::agent::result::{AgentRunResult, RunStatus, StepResult};
use crate::error::RunError;
use crate::memory::ConversationMemory;
use crate::message::Message;
use crate::model::{AssistantTurn, Delta, ModelClient};
use crate::tool::ToolBox;
use crate::usage::aggregate;

/// Runs an agent to completion without streaming, seeding `memory` with the
/// optional system prompt and `user_input`, then looping the step executor
/// up to `config.max_iterations` times (§4.G).
///
/// This is the non-cancellable, non-streaming entry point. See
/// [`run_cancellable`] and [`run_stream`] for the other two entry points
/// the run controller exposes (§4.H).
pub async fn run(
    agent_name: &str,
    system_prompt: Option<&str>,
    user_input: &str,
    model: &dyn ModelClient,
    tools: &ToolBox,
    config: &RunConfig,
) -> AgentRunResult {
    run_cancellable(
        agent_name,
        system_prompt,
        user_input,
        model,
        tools,
        config,
        &CancellationToken::new(),
    )
    .await
}

/// As [`run`], but stops at the next step boundary once `cancel` is
/// signaled, yielding `status = cancelled` (§4.G, §5).
pub async fn run_cancellable(
    agent_name: &str,
    system_prompt: Option<&str>,
    user_input: &str,
    model: &dyn ModelClient,
    tools: &ToolBox,
    config: &RunConfig,
    cancel: &CancellationToken,
) -> AgentRunResult {
    let run_id = Uuid::new_v4();
    let span = info_span!(
        "run",
        run_id = %run_id,
        agent_name = agent_name,
        max_iterations = config.max_iterations,
        status = tracing::field::Empty,
    );
    async move {
        info!("run started");
        let start_time = Utc::now();
        let started = Instant::now();
        let deadline = config.overall_timeout_seconds.map(Duration::from_secs_f64);

        let mut memory = ConversationMemory::new();
        if let Some(system_prompt) = system_prompt {
            memory.append(Message::system(system_prompt));
        }
        memory.append(Message::user(user_input));

        let mut steps: Vec<StepResult> = Vec::new();
        let mut status = None;
        let mut error = None;

        for step_index in 1..=config.max_iterations {
            if cancel.is_cancelled() {
                info!(step = step_index, "run cancelled before step");
                status = Some(RunStatus::Cancelled);
                break;
            }
            if let Some(deadline) = deadline {
                if started.elapsed() >= deadline {
                    warn!(step = step_index, "overall timeout elapsed");
                    status = Some(RunStatus::Error);
                    error = Some("deadline_exceeded".to_owned());
                    break;
                }
            }

            match execute_step(&mut memory, tools, model, config, step_index).await {
                Ok(step) => {
                    let finished = !step.has_tool_calls();
                    steps.push(step);
                    if finished {
                        status = Some(RunStatus::Completed);
                        break;
                    }
                }
                Err(err) => {
                    warn!(step = step_index, error = %err, "step executor failed");
                    status = Some(RunStatus::Error);
                    error = Some(err.to_string());
                    break;
                }
            }
        }

        let status = status.unwrap_or(RunStatus::MaxIterationsReached);
        tracing::Span::current().record("status", tracing::field::debug(&status));
        info!(?status, "run finished");
        finalize(run_id, agent_name, config, start_time, steps, status, error)
    }
    .instrument(span)
    .await
}

/// Runs an agent to completion, yielding a [`RunEvent`] as soon as each
/// becomes available rather than only returning the final result (§4.H).
///
/// When `model.supports_streaming()`, the Think phase is driven through
/// [`ModelClient::generate_stream`] and each [`Delta::Text`] fragment is
/// forwarded as its own `RunEvent::Delta` as soon as it arrives. Otherwise
/// this falls back to one non-streaming `generate` call per step and yields
/// a single `Delta` carrying the whole thought once it completes — the
/// same fallback the teacher's own streaming path takes for a
/// non-streaming-capable provider.
///
/// Tool dispatch within a step is always sequential in the streaming path,
/// regardless of `config.parallel_tool_calls`, so that `ToolCallStarted`/
/// `ToolCallFinished` events have an unambiguous total order; the
/// non-streaming [`run`]/[`run_cancellable`] entry points still honor
/// `parallel_tool_calls` for wall-clock concurrency.
pub fn run_stream<'a>(
    agent_name: &'a str,
    system_prompt: Option<&'a str>,
    user_input: &'a str,
    model: &'a dyn ModelClient,
    tools: &'a ToolBox,
    config: &'a RunConfig,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = RunEvent> + 'a {
    let run_id = Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id, agent_name = agent_name, max_iterations = config.max_iterations);
    stream! {
        info!("run started");
        let start_time = Utc::now();
        let started = Instant::now();
        let deadline = config.overall_timeout_seconds.map(Duration::from_secs_f64);

        let mut memory = ConversationMemory::new();
        if let Some(system_prompt) = system_prompt {
            memory.append(Message::system(system_prompt));
        }
        memory.append(Message::user(user_input));

        let mut steps: Vec<StepResult> = Vec::new();
        let mut status = None;
        let mut error = None;

        'outer: for step_index in 1..=config.max_iterations {
            if cancel.is_cancelled() {
                status = Some(RunStatus::Cancelled);
                break;
            }
            if let Some(deadline) = deadline {
                if started.elapsed() >= deadline {
                    status = Some(RunStatus::Error);
                    error = Some("deadline_exceeded".to_owned());
                    break;
                }
            }

            yield RunEvent::StepStarted { step: step_index };

            // 1. Think, either incrementally (if the provider supports it)
            //    or as one blocking call whose whole thought is surfaced as
            //    a single trailing delta.
            let options = build_generate_options(tools, config);
            let turn: AssistantTurn = if model.supports_streaming() {
                let mut deltas = model.generate_stream(memory.snapshot(), &options);
                let mut final_turn = None;
                let mut stream_error = None;
                while let Some(item) = deltas.next().await {
                    match item {
                        Ok(Delta::Text(chunk)) => {
                            if !chunk.is_empty() {
                                yield RunEvent::Delta { text: chunk };
                            }
                        }
                        Ok(Delta::Done(done_turn)) => {
                            final_turn = Some(done_turn);
                        }
                        Err(err) => {
                            stream_error = Some(err);
                            break;
                        }
                    }
                }
                drop(deltas);
                match (final_turn, stream_error) {
                    (_, Some(err)) => {
                        status = Some(RunStatus::Error);
                        error = Some(RunError::Model(err).to_string());
                        break 'outer;
                    }
                    (Some(turn), None) => turn,
                    (None, None) => {
                        status = Some(RunStatus::Error);
                        error = Some(
                            "model stream ended without a terminal delta".to_owned(),
                        );
                        break 'outer;
                    }
                }
            } else {
                let model_span = info_span!("model_call", provider = model.provider_name());
                let result = async { model.generate(memory.snapshot(), &options).await }
                    .instrument(model_span)
                    .await;
                match result {
                    Ok(turn) => {
                        if let Some(content) = &turn.content {
                            let text = content.flatten_to_text();
                            if !text.is_empty() {
                                yield RunEvent::Delta { text };
                            }
                        }
                        turn
                    }
                    Err(err) => {
                        status = Some(RunStatus::Error);
                        error = Some(RunError::Model(err).to_string());
                        break 'outer;
                    }
                }
            };

            let thought = turn.content.as_ref().map(|c| c.flatten_to_text());
            let usage = turn.usage;
            let has_tool_calls = turn.has_tool_calls();
            memory.append(turn.into_message());

            // 2. Decide.
            if !has_tool_calls {
                let step = StepResult {
                    step: step_index,
                    thought,
                    tool_calls: Vec::new(),
                    usage,
                    finish_reason: "stop".to_owned(),
                };
                yield RunEvent::StepFinished { step: step.clone() };
                steps.push(step);
                status = Some(RunStatus::Completed);
                break;
            }

            // 3-4. Act, always sequential here so tool-call events have a
            //    well-defined order.
            let last_message = memory
                .snapshot()
                .last()
                .expect("assistant message was just appended");
            let requests = last_message.tool_calls().to_vec();
            let timeout = Duration::from_secs_f64(config.per_tool_timeout_seconds.max(0.0));
            let outcomes = execute_tool_calls(tools, &requests, timeout, false).await;

            let mut tool_calls = Vec::with_capacity(outcomes.len());
            for (record, message) in outcomes {
                yield RunEvent::ToolCallStarted {
                    call_id: record.call_id.clone(),
                    tool_name: record.tool_name.clone(),
                };
                memory.append(message);
                yield RunEvent::ToolCallFinished { record: record.clone() };
                tool_calls.push(record);
            }

            let step = StepResult {
                step: step_index,
                thought,
                tool_calls,
                usage,
                finish_reason: "tool_calls".to_owned(),
            };
            yield RunEvent::StepFinished { step: step.clone() };
            steps.push(step);
        }

        let status = status.unwrap_or(RunStatus::MaxIterationsReached);
        info!(?status, "run finished");
        let result = finalize(run_id, agent_name, config, start_time, steps, status, error);
        yield RunEvent::RunFinished { result: Box::new(result) };
    }
    .instrument(span)
}

/// Assembles the final [`AgentRunResult`] from an exhausted step trace
/// (invariant 9: every aggregate is derivable from `steps`, but is computed
/// once here rather than by every consumer).
fn finalize(
    run_id: Uuid,
    agent_name: &str,
    config: &RunConfig,
    start_time: chrono::DateTime<Utc>,
    steps: Vec<StepResult>,
    status: RunStatus,
    error: Option<String>,
) -> AgentRunResult {
    let end_time = Utc::now();
    let duration_seconds = (end_time - start_time).num_milliseconds().max(0) as f64 / 1000.0;
    let output = steps
        .last()
        .and_then(|step| step.thought.clone())
        .unwrap_or_default();
    let usage = aggregate(steps.iter().map(|step| step.usage.as_ref()));
    let (tool_calls_total, tool_calls_by_name): (usize, BTreeMap<String, usize>) =
        AgentRunResult::tool_call_counts(&steps);

    AgentRunResult {
        run_id,
        agent_name: agent_name.to_owned(),
        output,
        status,
        steps,
        usage,
        tool_calls_total,
        tool_calls_by_name,
        start_time,
        end_time,
        duration_seconds,
        error,
        max_iterations: config.max_iterations,
    }
}
