//! End-to-end routing scenarios: scorer output feeding band escalation.

use super::super::config::BandPolicyStore;
use super::super::router::Router;
use super::super::types::{ComplexityScore, CompletionRequest, RoutingError};

const TIERED: &str = r#"
[[bands]]
name = "low"
escalation_threshold = 0.3
[[bands.candidates]]
provider = "stub"
model = "echo-1"

[[bands]]
name = "mid"
escalation_threshold = 0.3
[[bands.candidates]]
provider = "stub"
model = "echo-2"
[[bands.candidates]]
provider = "openai"
model = "gpt-4o-mini"

[[bands]]
name = "high"
[[bands.candidates]]
provider = "anthropic"
model = "claude-3-5-sonnet-latest"
"#;

const ANALYTICAL: &str = "Analyze, compare and evaluate these designs step by step.\n\
    1. Explain the architecture.\n\
    2. Describe security trade-offs.\n\
    3. Summarize the migration.\n\
    Why? How? When?\n\
    ```\nfn plan() -> u32 { 42 }\n```\n";

#[test]
fn test_escalation_is_single_step() {
    let store = BandPolicyStore::from_toml_str(TIERED).unwrap();
    let router = Router::new(&store);

    for score in [0.31, 0.75, 1.0] {
        let decision =
            router.route(&CompletionRequest::new("x").with_band("low"), &ComplexityScore::fixed(score)).unwrap();
        assert_eq!(decision.effective_band.as_deref(), Some("mid"), "score {score} skipped a tier");
    }
}

#[test]
fn test_mid_escalates_to_high() {
    let store = BandPolicyStore::from_toml_str(TIERED).unwrap();
    let router = Router::new(&store);

    let decision =
        router.route(&CompletionRequest::new("x").with_band("mid"), &ComplexityScore::fixed(0.9)).unwrap();
    assert_eq!(decision.effective_band.as_deref(), Some("high"));
    assert_eq!(decision.reason.to_string(), "escalated_from_mid_complexity_threshold");
}

#[test]
fn test_top_band_has_nowhere_to_go() {
    let store = BandPolicyStore::from_toml_str(TIERED).unwrap();
    let router = Router::new(&store);

    let decision =
        router.route(&CompletionRequest::new("x").with_band("high"), &ComplexityScore::fixed(1.0)).unwrap();
    assert_eq!(decision.effective_band.as_deref(), Some("high"));
    assert_eq!(decision.reason.to_string(), "banded");
}

#[test]
fn test_scored_prompt_escalates() {
    let store = BandPolicyStore::from_toml_str(TIERED).unwrap();
    let router = Router::new(&store);

    let score = store.scorer().score(ANALYTICAL);
    assert!(score.score > 0.3, "analytical prompt scored {}", score.score);
    let decision = router.route(&CompletionRequest::new(ANALYTICAL).with_band("low"), &score).unwrap();
    assert_eq!(decision.model, "echo-2");

    let short = store.scorer().score("hi");
    let decision = router.route(&CompletionRequest::new("hi").with_band("low"), &short).unwrap();
    assert_eq!(decision.model, "echo-1");
}

#[test]
fn test_alias_resolves_before_escalation() {
    let store = BandPolicyStore::from_toml_str(TIERED).unwrap();
    let router = Router::new(&store);

    let decision =
        router.route(&CompletionRequest::new("x").with_band("Simple"), &ComplexityScore::fixed(0.9)).unwrap();
    assert_eq!(decision.requested_band.as_deref(), Some("low"));
    assert_eq!(decision.effective_band.as_deref(), Some("mid"));
}

#[test]
fn test_unknown_band_never_defaults() {
    let store = BandPolicyStore::from_toml_str(TIERED).unwrap();
    let router = Router::new(&store);

    for score in [0.0, 0.5, 1.0] {
        let err = router
            .route(&CompletionRequest::new("x").with_band("nonexistent"), &ComplexityScore::fixed(score))
            .unwrap_err();
        assert_eq!(err.error_type(), "unknown_band");
        assert!(matches!(err, RoutingError::UnknownBand { .. }));
    }
}
