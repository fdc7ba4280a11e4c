//! Band routing and completion orchestration for Lattice.
//!
//! [`routing`] turns a prompt into a provider/model decision under a declared
//! cost/quality band. [`completion`] carries that decision through provider
//! calls, fallback, caching, pricing, tagging and metrics.

pub mod completion;
pub mod routing;

pub use completion::{
    CompletionError, CompletionOrchestrator, CompletionResponse, MetricsCollector, MetricsSnapshot,
    OrchestratorConfig, PricingTable, ResponseCache,
};
pub use routing::{
    BandPolicyStore, Candidate, ComplexityScorer, CompletionRequest, ConfigError, PolicyHandle, PolicyWatcher,
    Router, RoutingDecision, RoutingError, RoutingReason,
};
