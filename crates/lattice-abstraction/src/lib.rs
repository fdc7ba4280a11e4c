//! Provider abstraction layer for Lattice.
//!
//! This module defines the uniform "invoke" capability every LLM provider
//! adapter implements, plus the request/response/usage types that flow
//! across it. The router never calls a provider; it only names one, and the
//! orchestrator resolves that name to a [`Provider`] through a registry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when invoking a provider.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderError {
    /// The provider did not answer within the allotted time.
    #[error("Provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The provider name (e.g., "openai", "ollama").
        provider: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Provider quota exceeded or rate limit hit.
    #[error("Provider '{provider}' rate limit exceeded{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    RateLimited {
        /// The provider name.
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The provider failed on its side (5xx or equivalent).
    #[error("Provider '{provider}' upstream error: {message}")]
    Upstream {
        /// The provider name.
        provider: String,
        /// Description of the failure.
        message: String,
    },

    /// The provider rejected the request (4xx other than rate limiting).
    #[error("Provider '{provider}' rejected the request: {message}")]
    Rejected {
        /// The provider name.
        provider: String,
        /// Description of the rejection.
        message: String,
    },

    /// The provider is missing credentials or other required configuration.
    #[error("Provider '{provider}' is not configured: {message}")]
    NotConfigured {
        /// The provider name.
        provider: String,
        /// What is missing.
        message: String,
    },

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    Serialization(String),

    /// A transport-level error (connection refused, DNS, reset).
    #[error("Request Error: {0}")]
    Request(String),
}

impl ProviderError {
    /// Returns `true` when another candidate may succeed where this one failed.
    ///
    /// Timeouts, rate limits, upstream failures and transport errors are
    /// transient. Rejections, missing configuration and malformed payloads
    /// are terminal for the request.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Upstream { .. } | Self::Request(_)
        )
    }

    /// Stable snake_case identifier used in logs and error payloads.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "provider_timeout",
            Self::RateLimited { .. } => "provider_rate_limit",
            Self::Upstream { .. } | Self::Request(_) | Self::Serialization(_) => "provider_internal",
            Self::Rejected { .. } => "provider_validation",
            Self::NotConfigured { .. } => "configuration",
        }
    }

    /// The provider the error originated from, when known.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Timeout { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::Rejected { provider, .. }
            | Self::NotConfigured { provider, .. } => Some(provider),
            Self::Serialization(_) | Self::Request(_) => None,
        }
    }
}

/// Parameters for controlling the model's generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// What sampling temperature to use, between 0 and 2.
    pub temperature: Option<f32>,

    /// The maximum number of tokens to generate.
    pub max_tokens: Option<u32>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self { temperature: Some(0.2), max_tokens: Some(512) }
    }
}

/// Usage statistics for a provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,

    /// Number of tokens in the completion.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

impl ModelUsage {
    /// Builds usage from prompt and completion counts.
    #[must_use]
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self { prompt_tokens, completion_tokens, total_tokens: prompt_tokens.saturating_add(completion_tokens) }
    }
}

/// The response from a provider completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated content.
    pub content: String,

    /// The model that produced the response.
    pub model_id: String,

    /// Usage statistics for the request.
    pub usage: ModelUsage,

    /// Latency reported by the provider, if it reports one.
    pub latency_ms: Option<f64>,
}

/// A uniform "invoke" capability implemented by every provider adapter.
///
/// Providers must be `Send + Sync` so a single registry can serve
/// concurrent requests.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider tag the router uses to name this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Runs a single-turn completion of `prompt` on `model`.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the call fails; see
    /// [`ProviderError::is_transient`] for which failures allow fallback.
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        parameters: &ModelParameters,
    ) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = ProviderError::Timeout { provider: "openai".to_string(), timeout_ms: 100 };
        let limited = ProviderError::RateLimited { provider: "openai".to_string(), message: None };
        let rejected =
            ProviderError::Rejected { provider: "openai".to_string(), message: "bad".to_string() };
        let missing = ProviderError::NotConfigured {
            provider: "anthropic".to_string(),
            message: "ANTHROPIC_API_KEY not set".to_string(),
        };

        assert!(timeout.is_transient());
        assert!(limited.is_transient());
        assert!(ProviderError::Request("reset".to_string()).is_transient());
        assert!(!rejected.is_transient());
        assert!(!missing.is_transient());
        assert!(!ProviderError::Serialization("eof".to_string()).is_transient());
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = ModelUsage::new(u32::MAX, 1);
        assert_eq!(usage.prompt_tokens, u32::MAX);
        assert_eq!(usage.total_tokens, u32::MAX);
    }

    #[test]
    fn test_rate_limited_display() {
        let err = ProviderError::RateLimited {
            provider: "openai".to_string(),
            message: Some("slow down".to_string()),
        };
        assert_eq!(err.to_string(), "Provider 'openai' rate limit exceeded: slow down");

        let bare = ProviderError::RateLimited { provider: "openai".to_string(), message: None };
        assert_eq!(bare.to_string(), "Provider 'openai' rate limit exceeded");
    }

    #[test]
    fn test_error_type_and_provider() {
        let err = ProviderError::Upstream { provider: "gemini".to_string(), message: "500".to_string() };
        assert_eq!(err.error_type(), "provider_internal");
        assert_eq!(err.provider(), Some("gemini"));
        assert_eq!(ProviderError::Request("x".to_string()).provider(), None);
    }

    #[test]
    fn test_usage_totals() {
        let usage = ModelUsage::new(10, 32);
        assert_eq!(usage.total_tokens, 42);
    }
}
