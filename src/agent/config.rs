//! The run configuration surface (§6, §10.K).

use crate::model::ToolChoice;

/// Default maximum number of Think-Act-Observe iterations per run.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default per-tool wall-clock timeout, in seconds.
pub const DEFAULT_PER_TOOL_TIMEOUT_SECONDS: f64 = 30.0;

/// Every tunable recognized by the run controller and step executor (§6).
///
/// Construction never fails: every field has a documented default, and a
/// `max_iterations` of `0` is accepted (the run terminates immediately with
/// `status = max_iterations_reached` before any step is taken) rather than
/// rejected.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum number of Think-Act-Observe iterations. Default 10.
    pub max_iterations: usize,
    /// Whether tool calls within a step may be dispatched concurrently.
    /// Default `false`.
    pub parallel_tool_calls: bool,
    /// Steering passed to the model client on every `generate` call.
    /// Default [`ToolChoice::Auto`].
    pub tool_choice: ToolChoice,
    /// Wall-clock timeout applied to each individual tool invocation, in
    /// seconds. Default 30.
    pub per_tool_timeout_seconds: f64,
    /// Optional overall deadline for the whole run, in seconds. Default
    /// `None` (no deadline).
    pub overall_timeout_seconds: Option<f64>,
    /// Whether to emit `debug!`-level structured logging (full argument
    /// payloads, etc). Default `false`; span structure itself is always
    /// emitted regardless of this flag (§10.J).
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            parallel_tool_calls: false,
            tool_choice: ToolChoice::Auto,
            per_tool_timeout_seconds: DEFAULT_PER_TOOL_TIMEOUT_SECONDS,
            overall_timeout_seconds: None,
            verbose: false,
        }
    }
}

impl RunConfig {
    /// Builds a config with every default value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `max_iterations`.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets `parallel_tool_calls`.
    #[must_use]
    pub const fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    /// Sets `tool_choice`.
    #[must_use]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    /// Sets `per_tool_timeout_seconds`.
    #[must_use]
    pub const fn with_per_tool_timeout_seconds(mut self, seconds: f64) -> Self {
        self.per_tool_timeout_seconds = seconds;
        self
    }

    /// Sets `overall_timeout_seconds`.
    #[must_use]
    pub const fn with_overall_timeout_seconds(mut self, seconds: f64) -> Self {
        self.overall_timeout_seconds = Some(seconds);
        self
    }

    /// Sets `verbose`.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RunConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert!(!config.parallel_tool_calls);
        assert_eq!(config.tool_choice, ToolChoice::Auto);
        assert!((config.per_tool_timeout_seconds - 30.0).abs() < f64::EPSILON);
        assert_eq!(config.overall_timeout_seconds, None);
        assert!(!config.verbose);
    }

    #[test]
    fn builder_chain_overrides_defaults() {
        let config = RunConfig::new()
            .with_max_iterations(3)
            .with_parallel_tool_calls(true)
            .with_overall_timeout_seconds(5.0);
        assert_eq!(config.max_iterations, 3);
        assert!(config.parallel_tool_calls);
        assert_eq!(config.overall_timeout_seconds, Some(5.0));
    }

    #[test]
    fn zero_max_iterations_is_accepted() {
        let config = RunConfig::new().with_max_iterations(0);
        assert_eq!(config.max_iterations, 0);
    }
}
