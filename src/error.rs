//! Error taxonomy for the agent execution engine.
//!
//! Each failure domain gets its own `thiserror`-derived enum. Tool-level
//! failures are converted into error [`crate::tool::ToolCallResult`]s by the step
//! executor and never escape as a Rust `Err`; only [`RunError`] crosses the
//! public `run()` boundary.

use thiserror::Error;

/// Failures while decoding a stored or wire-form [`crate::message::Message`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MessageError {
    /// The message object carried no recognizable role tag.
    #[error("missing or unrecognized role tag")]
    MissingRole,

    /// A content block did not match any known `type` discriminator.
    #[error("malformed content block: {reason}")]
    MalformedContent {
        /// Human-readable description of the malformed shape.
        reason: String,
    },

    /// A tool-call request object did not match any known provider shape.
    #[error("malformed tool-call shape: {reason}")]
    MalformedToolCall {
        /// Human-readable description of the malformed shape.
        reason: String,
    },

    /// The raw JSON did not parse at all.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

/// Failures while parsing or dispatching a single tool call.
///
/// These never propagate out of the step executor as an `Err`; they are
/// always folded into an error [`crate::tool::ToolCallResult`] so the model can
/// observe and self-correct (§4.E, §4.F of the design).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("unknown tool: {0}")]
    NotFound(String),

    /// The arguments payload could not be decoded as the expected shape.
    #[error("argument decode error: {0}")]
    ArgumentDecode(String),

    /// The tool's `execute` raised or returned an error.
    #[error("tool execution error: {0}")]
    Execution(String),

    /// The tool did not complete within its configured timeout.
    #[error("tool timed out after {0:.1}s")]
    Timeout(f64),

    /// Attempted to register a tool whose name is already taken.
    #[error("duplicate tool name: {0}")]
    Duplicate(String),
}

/// Failures from a model client call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A retryable failure (network blip, rate limit). The model client
    /// owns retry policy; this variant surfaces only after retries (if any)
    /// are exhausted.
    #[error("transient model error: {0}")]
    Transient(String),

    /// A non-retryable failure (bad auth, invalid request shape).
    #[error("permanent model error: {0}")]
    Permanent(String),
}

/// The top-level error a `run()` call can return.
///
/// This is reserved for failures that terminate the run with
/// `status = error`; it is never returned for recoverable tool-level or
/// parser-level failures, which are folded into the trace instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// A malformed message could not be appended to memory.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// A non-retryable model failure terminated the run.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The overall run deadline was exceeded.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The run was cancelled via its cancellation handle.
    #[error("run cancelled")]
    Cancelled,

    /// An engine-internal invariant was violated. Indicates a bug in the
    /// engine itself, not a caller or model misbehavior.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Convenience alias for fallible engine operations.
pub type Result<T, E = RunError> = std::result::Result<T, E>;
