//! Tests for in-band fallback ordering.

use super::super::config::BandPolicyStore;
use super::super::router::Router;
use super::super::types::{Candidate, ComplexityScore, CompletionRequest, RoutingError, RoutingReason};

const THREE_DEEP: &str = r#"
default_band = "mid"

[[bands]]
name = "mid"
[[bands.candidates]]
provider = "stub"
model = "a"
[[bands.candidates]]
provider = "openai"
model = "b"
[[bands.candidates]]
provider = "anthropic"
model = "c"

[[bands]]
name = "high"
[[bands.candidates]]
provider = "stub"
model = "z"
"#;

fn create_test_store() -> BandPolicyStore {
    BandPolicyStore::from_toml_str(THREE_DEEP).unwrap()
}

#[test]
fn test_fallback_walks_candidates_in_order() {
    let store = create_test_store();
    let router = Router::new(&store);

    let first = router.route(&CompletionRequest::new("hi"), &ComplexityScore::fixed(0.2)).unwrap();
    assert_eq!(first.model, "a");

    let second = router.next_fallback(&first, &first.candidate()).unwrap();
    assert_eq!((second.provider.as_str(), second.model.as_str()), ("openai", "b"));
    assert_eq!(second.reason.to_string(), "fallback_from:stub/a");

    let third = router.next_fallback(&second, &second.candidate()).unwrap();
    assert_eq!((third.provider.as_str(), third.model.as_str()), ("anthropic", "c"));
    assert_eq!(third.reason.to_string(), "fallback_from:openai/b");

    let err = router.next_fallback(&third, &third.candidate()).unwrap_err();
    match err {
        RoutingError::NoMoreCandidates { band, tried } => {
            assert_eq!(band.as_deref(), Some("mid"));
            assert_eq!(tried, vec!["stub/a", "openai/b", "anthropic/c"]);
        }
        other => panic!("Expected NoMoreCandidates, got {other:?}"),
    }
}

#[test]
fn test_fallback_preserves_lineage() {
    let store = create_test_store();
    let router = Router::new(&store);

    let first = router.route(&CompletionRequest::new("hi"), &ComplexityScore::fixed(0.42)).unwrap();
    let second = router.next_fallback(&first, &first.candidate()).unwrap();

    assert_eq!(second.effective_band, first.effective_band);
    assert_eq!(second.requested_band, first.requested_band);
    assert_eq!(second.initial_reason, RoutingReason::Banded);
    assert!((second.complexity_score - 0.42).abs() < f64::EPSILON);
    assert_eq!(second.tried.len(), 2);
}

#[test]
fn test_fallback_never_leaves_band() {
    let store = create_test_store();
    let router = Router::new(&store);

    let mut decision = router.route(&CompletionRequest::new("hi"), &ComplexityScore::fixed(1.0)).unwrap();
    let mut seen = vec![decision.model.clone()];
    while let Ok(next) = router.next_fallback(&decision, &decision.candidate()) {
        seen.push(next.model.clone());
        decision = next;
    }

    assert_eq!(seen, vec!["a", "b", "c"]);
}

#[test]
fn test_fallback_skips_already_tried_candidates() {
    let store = create_test_store();
    let router = Router::new(&store);

    let first = router.route(&CompletionRequest::new("hi"), &ComplexityScore::fixed(0.0)).unwrap();
    // A failure reported for a pair that was never the current choice still counts as tried.
    let next = router.next_fallback(&first, &Candidate::new("openai", "b")).unwrap();

    assert_eq!(next.model, "c");
    assert_eq!(next.reason.to_string(), "fallback_from:openai/b");
}

#[test]
fn test_fallback_after_escalation_stays_in_escalated_band() {
    let store = BandPolicyStore::from_toml_str(
        r#"
[[bands]]
name = "low"
escalation_threshold = 0.5
[[bands.candidates]]
provider = "stub"
model = "l1"

[[bands]]
name = "mid"
[[bands.candidates]]
provider = "stub"
model = "m1"
[[bands.candidates]]
provider = "stub"
model = "m2"
"#,
    )
    .unwrap();
    let router = Router::new(&store);

    let first = router.route(&CompletionRequest::new("hi").with_band("low"), &ComplexityScore::fixed(0.9)).unwrap();
    let second = router.next_fallback(&first, &first.candidate()).unwrap();

    assert_eq!(second.model, "m2");
    assert_eq!(second.effective_band.as_deref(), Some("mid"));
    assert!(second.was_escalated());
    assert!(router.next_fallback(&second, &second.candidate()).is_err());
}
