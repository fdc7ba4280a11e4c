//! Band router: maps a request and its complexity score to a provider/model.
//!
//! Decision order: explicit override, band resolution, single-step escalation,
//! then the band's first candidate. `next_fallback` walks the same band's list
//! when the orchestrator reports a transient failure.

use super::config::BandPolicyStore;
use super::types::{Candidate, ComplexityScore, CompletionRequest, RoutingDecision, RoutingError, RoutingReason};
use tracing::{debug, info};

/// Stateless router over one policy snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Router<'a> {
    policy: &'a BandPolicyStore,
}

impl<'a> Router<'a> {
    /// Creates a router over `policy`.
    #[must_use]
    pub fn new(policy: &'a BandPolicyStore) -> Self {
        Self { policy }
    }

    /// Produces the initial routing decision for a request.
    ///
    /// # Errors
    /// - `AmbiguousOverride` if only one of provider/model is overridden
    /// - `UnknownProviderModel` if a full override names a pair no band lists
    /// - `UnknownBand` if the requested band is neither a band nor an alias
    pub fn route(
        &self,
        request: &CompletionRequest,
        score: &ComplexityScore,
    ) -> Result<RoutingDecision, RoutingError> {
        let provider = non_blank(request.provider.as_deref());
        let model = non_blank(request.model.as_deref());

        match (provider, model) {
            (Some(provider), Some(model)) => return self.route_override(provider, model, score),
            (None, None) => {}
            (provider, model) => {
                debug!(provider = ?provider, model = ?model, "Rejecting partial override");
                return Err(RoutingError::AmbiguousOverride {
                    provider: provider.map(str::to_string),
                    model: model.map(str::to_string),
                });
            }
        }

        let requested = non_blank(request.band.as_deref()).unwrap_or_else(|| self.policy.default_band());
        let band = self.policy.resolve(requested)?;

        let (effective, reason) = match band.escalation_threshold {
            Some(threshold) if score.score > threshold => match self.policy.next_band(&band.name) {
                Some(next) => (next, RoutingReason::Escalated { from: band.name.clone() }),
                None => {
                    debug!(band = %band.name, "Threshold exceeded but no higher band is configured");
                    (band, RoutingReason::Banded)
                }
            },
            _ => (band, RoutingReason::Banded),
        };

        let chosen = effective.primary();
        info!(
            provider = %chosen.provider,
            model = %chosen.model,
            band = %effective.name,
            requested_band = %band.name,
            reason = %reason,
            complexity_score = score.score,
            "routing decision"
        );

        Ok(RoutingDecision {
            provider: chosen.provider.clone(),
            model: chosen.model.clone(),
            effective_band: Some(effective.name.clone()),
            reason: reason.clone(),
            complexity_score: score.score,
            requested_band: Some(band.name.clone()),
            initial_reason: reason,
            tried: vec![chosen.clone()],
        })
    }

    fn route_override(
        &self,
        provider: &str,
        model: &str,
        score: &ComplexityScore,
    ) -> Result<RoutingDecision, RoutingError> {
        let candidate = Candidate::new(provider, model);
        if !self.policy.is_known_pair(&candidate.provider, &candidate.model) {
            return Err(RoutingError::UnknownProviderModel { provider: candidate.provider, model: candidate.model });
        }

        info!(
            provider = %candidate.provider,
            model = %candidate.model,
            reason = "explicit_override",
            complexity_score = score.score,
            "routing decision"
        );

        Ok(RoutingDecision {
            provider: candidate.provider.clone(),
            model: candidate.model.clone(),
            effective_band: None,
            reason: RoutingReason::ExplicitOverride,
            complexity_score: score.score,
            requested_band: None,
            initial_reason: RoutingReason::ExplicitOverride,
            tried: vec![candidate],
        })
    }

    /// Returns the next untried candidate in the decision's band after `failed` failed.
    ///
    /// Stays within the effective band; never escalates.
    ///
    /// # Errors
    /// - `NoMoreCandidates` when the band's list is exhausted, or for override decisions
    /// - `UnknownBand` if the band is missing from this policy snapshot
    pub fn next_fallback(
        &self,
        decision: &RoutingDecision,
        failed: &Candidate,
    ) -> Result<RoutingDecision, RoutingError> {
        let mut tried = decision.tried.clone();
        if !decision.has_tried(failed) {
            tried.push(failed.clone());
        }

        let Some(band_name) = decision.effective_band.as_deref() else {
            return Err(RoutingError::NoMoreCandidates {
                band: None,
                tried: tried.iter().map(Candidate::label).collect(),
            });
        };
        let band = self.policy.resolve(band_name)?;

        let Some(next) = band.candidates.iter().find(|c| !tried.iter().any(|t| t.is(&c.provider, &c.model))) else {
            info!(band = %band.name, tried = tried.len(), "Fallback candidates exhausted");
            return Err(RoutingError::NoMoreCandidates {
                band: Some(band.name.clone()),
                tried: tried.iter().map(Candidate::label).collect(),
            });
        };

        let reason = RoutingReason::Fallback { provider: failed.provider.clone(), model: failed.model.clone() };
        info!(
            provider = %next.provider,
            model = %next.model,
            band = %band.name,
            reason = %reason,
            "routing decision"
        );

        tried.push(next.clone());
        Ok(RoutingDecision {
            provider: next.provider.clone(),
            model: next.model.clone(),
            effective_band: decision.effective_band.clone(),
            reason,
            complexity_score: decision.complexity_score,
            requested_band: decision.requested_band.clone(),
            initial_reason: decision.initial_reason.clone(),
            tried,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
[[bands]]
name = "low"
escalation_threshold = 0.8
[[bands.candidates]]
provider = "stub"
model = "echo-1"

[[bands]]
name = "mid"
[[bands.candidates]]
provider = "stub"
model = "echo-2"
[[bands.candidates]]
provider = "openai"
model = "gpt-4o-mini"
"#;

    fn store() -> BandPolicyStore {
        BandPolicyStore::from_toml_str(POLICY).unwrap()
    }

    #[test]
    fn test_low_score_stays_in_band() {
        let store = store();
        let router = Router::new(&store);
        let decision =
            router.route(&CompletionRequest::new("hi").with_band("low"), &ComplexityScore::fixed(0.1)).unwrap();

        assert_eq!(decision.provider, "stub");
        assert_eq!(decision.model, "echo-1");
        assert_eq!(decision.effective_band.as_deref(), Some("low"));
        assert_eq!(decision.reason.to_string(), "banded");
        assert!((decision.complexity_score - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_high_score_escalates_one_band() {
        let store = store();
        let router = Router::new(&store);
        let decision = router
            .route(&CompletionRequest::new("long analysis").with_band("low"), &ComplexityScore::fixed(0.95))
            .unwrap();

        assert_eq!((decision.provider.as_str(), decision.model.as_str()), ("stub", "echo-2"));
        assert_eq!(decision.effective_band.as_deref(), Some("mid"));
        assert_eq!(decision.requested_band.as_deref(), Some("low"));
        assert_eq!(decision.reason.to_string(), "escalated_from_low_complexity_threshold");
        assert!(decision.was_escalated());
    }

    #[test]
    fn test_threshold_is_strict() {
        let store = store();
        let router = Router::new(&store);
        let decision =
            router.route(&CompletionRequest::new("x").with_band("low"), &ComplexityScore::fixed(0.8)).unwrap();
        assert_eq!(decision.effective_band.as_deref(), Some("low"));
    }

    #[test]
    fn test_default_band_when_absent() {
        let store = store();
        let router = Router::new(&store);
        let decision = router.route(&CompletionRequest::new("hi"), &ComplexityScore::fixed(0.0)).unwrap();
        assert_eq!(decision.effective_band.as_deref(), Some("low"));
    }

    #[test]
    fn test_explicit_override() {
        let store = store();
        let router = Router::new(&store);
        let decision = router
            .route(&CompletionRequest::new("hi").with_override("OpenAI", "gpt-4o-mini"), &ComplexityScore::fixed(0.99))
            .unwrap();

        assert_eq!(decision.provider, "openai");
        assert_eq!(decision.model, "gpt-4o-mini");
        assert!(decision.effective_band.is_none());
        assert_eq!(decision.reason, RoutingReason::ExplicitOverride);
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let store = store();
        let router = Router::new(&store);
        let err = router
            .route(&CompletionRequest::new("hi").with_override("openai", "gpt-5"), &ComplexityScore::fixed(0.0))
            .unwrap_err();
        assert_eq!(err, RoutingError::UnknownProviderModel { provider: "openai".to_string(), model: "gpt-5".to_string() });
    }

    #[test]
    fn test_partial_override_is_ambiguous() {
        let store = store();
        let router = Router::new(&store);

        let mut provider_only = CompletionRequest::new("hi");
        provider_only.provider = Some("openai".to_string());
        assert!(matches!(
            router.route(&provider_only, &ComplexityScore::fixed(0.0)),
            Err(RoutingError::AmbiguousOverride { .. })
        ));

        for band in [None, Some("low"), Some("nonexistent")] {
            let mut model_only = CompletionRequest::new("hi");
            model_only.model = Some("gpt-4o-mini".to_string());
            model_only.band = band.map(str::to_string);
            assert!(matches!(
                router.route(&model_only, &ComplexityScore::fixed(0.0)),
                Err(RoutingError::AmbiguousOverride { .. })
            ));
        }
    }

    #[test]
    fn test_blank_override_fields_are_ignored() {
        let store = store();
        let router = Router::new(&store);
        let mut request = CompletionRequest::new("hi");
        request.provider = Some("  ".to_string());
        request.model = Some(String::new());
        let decision = router.route(&request, &ComplexityScore::fixed(0.0)).unwrap();
        assert_eq!(decision.reason, RoutingReason::Banded);
    }

    #[test]
    fn test_unknown_band_is_rejected() {
        let store = store();
        let router = Router::new(&store);
        let err = router
            .route(&CompletionRequest::new("hi").with_band("nonexistent"), &ComplexityScore::fixed(0.0))
            .unwrap_err();
        assert_eq!(err, RoutingError::UnknownBand { band: "nonexistent".to_string() });
    }

    #[test]
    fn test_override_has_no_fallback() {
        let store = store();
        let router = Router::new(&store);
        let decision = router
            .route(&CompletionRequest::new("hi").with_override("stub", "echo-1"), &ComplexityScore::fixed(0.0))
            .unwrap();
        let err = router.next_fallback(&decision, &decision.candidate()).unwrap_err();
        assert!(matches!(err, RoutingError::NoMoreCandidates { band: None, .. }));
    }
}
