//! Completion layer: everything between a routing decision and the response
//! returned to the caller.

pub mod cache;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod pricing;
pub mod tags;
pub mod types;

pub use cache::{cache_key, ResponseCache};
pub use error::CompletionError;
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use orchestrator::{CompletionOrchestrator, OrchestratorConfig};
pub use pricing::{CostBreakdown, ModelPrice, PriceUnit, PricingTable};
pub use tags::detect_tags;
pub use types::{Attempt, CompletionResponse, RoutingSummary, UsageStats};
