//! Types for the band routing system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A concrete (provider, model) pair eligible for selection within a band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider tag, lowercase (e.g., "openai", "stub").
    pub provider: String,
    /// Model identifier passed through to the provider.
    pub model: String,
    /// Optional cost/quality weight. Informational; fallback order is the list order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Candidate {
    /// Creates a candidate, normalising the provider tag to lowercase.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self { provider: provider.into().trim().to_lowercase(), model: model.into().trim().to_string(), weight: None }
    }

    /// Returns `true` if this candidate names the given pair.
    #[must_use]
    pub fn is(&self, provider: &str, model: &str) -> bool {
        self.provider == provider && self.model == model
    }

    /// `provider/model` label used in reasons, logs and error messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// A named band and its fallback-ordered candidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandPolicy {
    /// Band name, lowercase.
    pub name: String,
    /// Optional human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered candidates; never empty. The first is preferred.
    pub candidates: Vec<Candidate>,
    /// Complexity score above which requests escalate to the next band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_threshold: Option<f64>,
}

impl BandPolicy {
    /// The preferred candidate.
    #[must_use]
    pub fn primary(&self) -> &Candidate {
        &self.candidates[0]
    }
}

/// A completion request as received from the HTTP layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The prompt text. Must be non-empty.
    pub prompt: String,
    /// Requested band; the policy's default band applies when absent.
    #[serde(default)]
    pub band: Option<String>,
    /// Explicit provider override (all-or-nothing with `model`).
    #[serde(default)]
    pub provider: Option<String>,
    /// Explicit model override (all-or-nothing with `provider`).
    #[serde(default)]
    pub model: Option<String>,
    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Opaque caller metadata. Never inspected by routing. `null` reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<HashMap<String, serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl CompletionRequest {
    /// Creates a request for `prompt` with no band or overrides.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    /// Sets the requested band.
    #[must_use]
    pub fn with_band(mut self, band: impl Into<String>) -> Self {
        self.band = Some(band.into());
        self
    }

    /// Sets an explicit provider/model override.
    #[must_use]
    pub fn with_override(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }
}

/// Why a decision picked its candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingReason {
    /// First candidate of the requested band.
    Banded,
    /// First candidate of the band above `from`, after a complexity escalation.
    Escalated {
        /// Band the request originally resolved to.
        from: String,
    },
    /// Explicit provider/model override; not banded.
    ExplicitOverride,
    /// Next untried candidate after `provider/model` failed.
    Fallback {
        /// Provider of the failed candidate.
        provider: String,
        /// Model of the failed candidate.
        model: String,
    },
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Banded => write!(f, "banded"),
            Self::Escalated { from } => write!(f, "escalated_from_{}_complexity_threshold", from),
            Self::ExplicitOverride => write!(f, "explicit_override"),
            Self::Fallback { provider, model } => write!(f, "fallback_from:{}/{}", provider, model),
        }
    }
}

impl Serialize for RoutingReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A routing decision. Produced fresh per request and per fallback step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    /// Chosen provider tag.
    pub provider: String,
    /// Chosen model.
    pub model: String,
    /// Band the candidate came from; `None` for explicit overrides.
    pub effective_band: Option<String>,
    /// Why this candidate was chosen.
    pub reason: RoutingReason,
    /// Complexity score the decision was made with.
    pub complexity_score: f64,
    /// Band the request asked for (after default/alias resolution).
    pub requested_band: Option<String>,
    /// Reason of the first decision in this request's lineage.
    pub initial_reason: RoutingReason,
    /// Candidates already attempted in this lineage, in order, including this one.
    pub tried: Vec<Candidate>,
}

impl RoutingDecision {
    /// The chosen candidate.
    #[must_use]
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.provider.clone(), self.model.clone())
    }

    /// Returns `true` if `candidate` was already attempted in this lineage.
    #[must_use]
    pub fn has_tried(&self, candidate: &Candidate) -> bool {
        self.tried.iter().any(|c| c.is(&candidate.provider, &candidate.model))
    }

    /// Returns `true` if the initial decision escalated the band.
    #[must_use]
    pub fn was_escalated(&self) -> bool {
        matches!(self.initial_reason, RoutingReason::Escalated { .. })
    }
}

/// Complexity score with breakdown of scoring factors.
///
/// All factors are normalised to `[0, 1]`; `score` is their weighted mean.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ComplexityScore {
    /// Overall complexity score (0-1).
    pub score: f64,
    /// Prompt length factor.
    pub length_factor: f64,
    /// Newlines, list items and code fences.
    pub structure_factor: f64,
    /// Presence of code.
    pub code_factor: f64,
    /// Distinct complexity keywords.
    pub keyword_factor: f64,
    /// Question marks (multi-part questions).
    pub question_factor: f64,
    /// Digit and symbol density.
    pub symbol_factor: f64,
}

impl ComplexityScore {
    /// A score with no breakdown, for callers that already know the value.
    #[must_use]
    pub fn fixed(score: f64) -> Self {
        Self { score: score.clamp(0.0, 1.0), ..Self::default() }
    }
}

/// Weights for complexity scoring factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScorerWeights {
    /// Weight for prompt length.
    pub length: f64,
    /// Weight for structural markers.
    pub structure: f64,
    /// Weight for code presence.
    pub code: f64,
    /// Weight for complexity keywords.
    pub keywords: f64,
    /// Weight for question marks.
    pub questions: f64,
    /// Weight for digits and symbols.
    pub symbols: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self { length: 0.35, structure: 0.2, code: 0.1, keywords: 0.2, questions: 0.1, symbols: 0.05 }
    }
}

impl ScorerWeights {
    /// Named weights, in declaration order.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("length", self.length),
            ("structure", self.structure),
            ("code", self.code),
            ("keywords", self.keywords),
            ("questions", self.questions),
            ("symbols", self.symbols),
        ]
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries().iter().map(|(_, w)| w).sum()
    }
}

/// Errors produced while routing a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The requested band is not configured.
    #[error("Unknown band '{band}'")]
    UnknownBand {
        /// The band name as requested.
        band: String,
    },

    /// The explicit override names a pair no band lists.
    #[error("Unknown provider/model override '{provider}/{model}'")]
    UnknownProviderModel {
        /// Requested provider.
        provider: String,
        /// Requested model.
        model: String,
    },

    /// Only one of provider/model was overridden.
    #[error("Overrides must set both provider and model (provider: {provider:?}, model: {model:?})")]
    AmbiguousOverride {
        /// Provider override, if set.
        provider: Option<String>,
        /// Model override, if set.
        model: Option<String>,
    },

    /// Every candidate in the band has been tried.
    #[error("No more candidates{} after trying [{}]", .band.as_ref().map(|b| format!(" in band '{}'", b)).unwrap_or_default(), .tried.join(", "))]
    NoMoreCandidates {
        /// Band whose list ran out; `None` for explicit overrides.
        band: Option<String>,
        /// Labels of the candidates that were tried.
        tried: Vec<String>,
    },
}

impl RoutingError {
    /// Stable snake_case identifier used in logs and error payloads.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UnknownBand { .. } => "unknown_band",
            Self::UnknownProviderModel { .. } => "unknown_provider_model",
            Self::AmbiguousOverride { .. } => "ambiguous_override",
            Self::NoMoreCandidates { .. } => "no_more_candidates",
        }
    }
}
