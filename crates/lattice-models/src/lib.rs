//! Provider adapters for Lattice.
//!
//! This crate provides concrete implementations of the `Provider` trait.
//!
//! # Supported Providers
//!
//! - **Stub**: Deterministic echo for testing and development
//! - **Anthropic**: Anthropic's Claude models (API key required)
//! - **Gemini**: Google's Gemini models (API key required)
//! - **OpenAI**: OpenAI's GPT models (API key required)
//! - **Ollama**: Local models via Ollama (no API key, local execution)

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod ollama;
pub mod openai;
mod status;

use async_trait::async_trait;
use lattice_abstraction::{ModelParameters, ModelUsage, Provider, ProviderError, ProviderResponse};
use tracing::debug;

pub use anthropic::AnthropicProvider;
pub use factory::{ProviderFactory, ProviderKind, ProviderRegistry};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

/// A deterministic echo provider for testing and offline runs.
///
/// Every model name is accepted; the reply echoes the prompt tagged with the model.
#[derive(Debug, Clone, Default)]
pub struct StubProvider;

impl StubProvider {
    /// Creates a new `StubProvider`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        parameters: &ModelParameters,
    ) -> Result<ProviderResponse, ProviderError> {
        debug!(model_id = %model, prompt_len = prompt.len(), parameters = ?parameters, "StubProvider echoing prompt");

        let content = format!("[stub:{model}] {}", prompt.trim());
        let usage = ModelUsage::new(count_tokens(prompt), count_tokens(&content));

        Ok(ProviderResponse { content, model_id: model.to_string(), usage, latency_ms: Some(0.0) })
    }
}

/// Count tokens in a string (simplified: word count).
#[allow(clippy::cast_possible_truncation)]
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_echoes_prompt() {
        let stub = StubProvider::new();
        let response = stub.complete("echo-1", "  hello there  ", &ModelParameters::default()).await.unwrap();

        assert_eq!(response.content, "[stub:echo-1] hello there");
        assert_eq!(response.model_id, "echo-1");
        assert_eq!(response.usage.prompt_tokens, 2);
        assert_eq!(response.usage.completion_tokens, 3);
        assert_eq!(response.usage.total_tokens, 5);
    }

    #[tokio::test]
    async fn test_stub_is_deterministic() {
        let stub = StubProvider::new();
        let params = ModelParameters::default();
        let a = stub.complete("echo-2", "same prompt", &params).await.unwrap();
        let b = stub.complete("echo-2", "same prompt", &params).await.unwrap();
        assert_eq!(a.content, b.content);
        assert_eq!(a.usage, b.usage);
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("one  two\nthree"), 3);
    }
}
