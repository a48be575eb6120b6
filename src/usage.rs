//! Token usage accounting (§3).

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Token usage for a single LLM turn.
///
/// Field names are aliased to the common OpenAI-style wire names so a
/// provider's raw usage payload deserializes directly into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageStats {
    /// Tokens consumed by the prompt (input).
    #[serde(alias = "prompt_tokens")]
    pub prompt_tokens: u64,
    /// Tokens generated by the model (output).
    #[serde(alias = "completion_tokens")]
    pub completion_tokens: u64,
    /// `prompt_tokens + completion_tokens`.
    #[serde(alias = "total_tokens")]
    pub total_tokens: u64,
}

impl UsageStats {
    /// Builds usage stats, computing `total_tokens` from its parts.
    #[must_use]
    pub const fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Returns `true` if every field is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0 && self.total_tokens == 0
    }
}

impl Add for UsageStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for UsageStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Usage aggregated across every [`crate::agent::result::StepResult`] in a
/// run (§3: "sum of each field across all `StepResult.usage`").
pub type AggregatedUsage = UsageStats;

/// Sums an iterator of optional per-step usage into one [`AggregatedUsage`].
pub fn aggregate<'a>(steps: impl IntoIterator<Item = Option<&'a UsageStats>>) -> AggregatedUsage {
    steps
        .into_iter()
        .flatten()
        .fold(AggregatedUsage::default(), |acc, usage| acc + *usage)
}
