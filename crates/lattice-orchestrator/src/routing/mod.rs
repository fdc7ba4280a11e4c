//! Band routing system.
//!
//! This module maps a prompt (plus optional band or provider/model overrides)
//! to a concrete provider/model under a declared cost/quality band, with
//! complexity-driven escalation and deterministic in-band fallback.

pub mod complexity;
pub mod config;
pub mod reload;
pub mod router;
pub mod types;

#[cfg(test)]
mod tests;

pub use complexity::ComplexityScorer;
pub use config::{BandPolicyStore, ConfigError, PolicyFile};
pub use reload::{PolicyHandle, PolicyWatcher};
pub use router::Router;
pub use types::{
    BandPolicy, Candidate, ComplexityScore, CompletionRequest, RoutingDecision, RoutingError, RoutingReason,
    ScorerWeights,
};
