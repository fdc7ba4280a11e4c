//! Completion response types.

use super::pricing::CostBreakdown;
use crate::routing::Candidate;
use lattice_abstraction::{ModelUsage, ProviderError};
use serde::{Deserialize, Serialize};

/// Token usage reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl From<ModelUsage> for UsageStats {
    fn from(usage: ModelUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.prompt_tokens.saturating_add(usage.completion_tokens),
        }
    }
}

/// One failed provider attempt within a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub provider: String,
    pub model: String,
    /// Stable error code of the failure.
    pub error_type: String,
}

impl Attempt {
    /// Records `candidate` as having failed with `error`.
    #[must_use]
    pub fn failed(candidate: &Candidate, error: &ProviderError) -> Self {
        Self {
            provider: candidate.provider.clone(),
            model: candidate.model.clone(),
            error_type: error.error_type().to_string(),
        }
    }
}

/// How the serving candidate was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSummary {
    /// Reason of the decision that served the request.
    pub reason: String,
    /// Candidates of the effective band, in fallback order.
    pub candidates: Vec<Candidate>,
    /// The candidate that produced the response.
    pub chosen: Candidate,
    /// Failed attempts before `chosen`, in order.
    #[serde(default)]
    pub attempts: Vec<Attempt>,
}

/// Result of a successful completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    /// Effective band; `None` for explicit overrides.
    pub band: Option<String>,
    pub routing_reason: String,
    pub complexity_score: f64,
    pub latency_ms: f64,
    pub usage: UsageStats,
    pub cost: CostBreakdown,
    /// Sorted sensitive-content tags of the prompt and response.
    pub tags: Vec<String>,
    /// `true` when served from the response cache.
    #[serde(default)]
    pub cached: bool,
    pub routing: RoutingSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_stats_from_model_usage() {
        let stats = UsageStats::from(ModelUsage::new(12, 30));
        assert_eq!(stats, UsageStats { input_tokens: 12, output_tokens: 30, total_tokens: 42 });
    }

    #[test]
    fn test_usage_stats_total_saturates() {
        let usage = ModelUsage { prompt_tokens: u32::MAX, completion_tokens: u32::MAX, total_tokens: 0 };
        assert_eq!(UsageStats::from(usage).total_tokens, u32::MAX);
    }
}
