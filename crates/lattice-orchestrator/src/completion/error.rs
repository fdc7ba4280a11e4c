//! Error types for completion requests.

use crate::routing::RoutingError;
use lattice_abstraction::ProviderError;
use serde_json::{json, Value};
use thiserror::Error;

/// Result type for completion operations.
pub type Result<T> = std::result::Result<T, CompletionError>;

/// A completion request failure, as surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The router rejected the request or ran out of candidates.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// A provider failed in a way another candidate cannot fix.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The policy names a provider this process has no adapter for.
    #[error("Provider adapter '{provider}' is not registered")]
    ProviderNotRegistered {
        /// The unregistered provider tag.
        provider: String,
    },
}

impl CompletionError {
    /// Stable snake_case identifier for logs and error payloads.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Routing(e) => e.error_type(),
            Self::Provider(e) => e.error_type(),
            Self::ProviderNotRegistered { .. } => "configuration",
        }
    }

    /// HTTP status the error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Routing(RoutingError::NoMoreCandidates { .. }) => 503,
            Self::Routing(_) => 400,
            Self::Provider(ProviderError::NotConfigured { .. }) | Self::ProviderNotRegistered { .. } => 500,
            Self::Provider(_) => 502,
        }
    }

    /// The provider involved, when there is one.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Provider(e) => e.provider(),
            Self::ProviderNotRegistered { provider } => Some(provider),
            Self::InvalidRequest(_) | Self::Routing(_) => None,
        }
    }

    /// `{"error": {"type", "message", "provider"?}}` body.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "type": self.error_type(),
            "message": self.to_string(),
        });
        if let (Some(provider), Some(map)) = (self.provider(), error.as_object_mut()) {
            map.insert("provider".to_string(), Value::String(provider.to_string()));
        }
        json!({ "error": error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_status_codes() {
        let unknown: CompletionError = RoutingError::UnknownBand { band: "x".to_string() }.into();
        assert_eq!(unknown.status_code(), 400);
        assert_eq!(unknown.error_type(), "unknown_band");

        let ambiguous: CompletionError =
            RoutingError::AmbiguousOverride { provider: Some("openai".to_string()), model: None }.into();
        assert_eq!(ambiguous.status_code(), 400);

        let exhausted: CompletionError =
            RoutingError::NoMoreCandidates { band: Some("low".to_string()), tried: vec!["stub/echo-1".to_string()] }
                .into();
        assert_eq!(exhausted.status_code(), 503);
        assert_eq!(exhausted.error_type(), "no_more_candidates");
    }

    #[test]
    fn test_provider_status_codes() {
        let rejected: CompletionError =
            ProviderError::Rejected { provider: "openai".to_string(), message: "bad".to_string() }.into();
        assert_eq!(rejected.status_code(), 502);

        let missing: CompletionError =
            ProviderError::NotConfigured { provider: "openai".to_string(), message: "no key".to_string() }.into();
        assert_eq!(missing.status_code(), 500);

        let unregistered = CompletionError::ProviderNotRegistered { provider: "acme".to_string() };
        assert_eq!(unregistered.status_code(), 500);
        assert_eq!(CompletionError::InvalidRequest("empty".to_string()).status_code(), 400);
    }

    #[test]
    fn test_json_body() {
        let body = CompletionError::ProviderNotRegistered { provider: "acme".to_string() }.to_json();
        assert_eq!(body["error"]["type"], "configuration");
        assert_eq!(body["error"]["provider"], "acme");
        assert_eq!(body["error"]["message"], "Provider adapter 'acme' is not registered");

        let body = CompletionError::InvalidRequest("prompt is required".to_string()).to_json();
        assert_eq!(body["error"]["type"], "invalid_request");
        assert!(body["error"].get("provider").is_none());
    }
}
