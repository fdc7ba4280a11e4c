//! Anthropic provider implementation.
//!
//! The Messages API always requires `max_tokens`, so a default is sent when
//! the caller leaves it unset.

use async_trait::async_trait;
use lattice_abstraction::{ModelParameters, ModelUsage, Provider, ProviderError, ProviderResponse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Instant;
use tracing::{debug, warn};

use crate::status::{check_status, decode_json, transport_error};

const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic provider implementation.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Messages API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl AnthropicProvider {
    /// Creates a new `AnthropicProvider` from `ANTHROPIC_API_KEY`.
    ///
    /// # Errors
    /// Returns `ProviderError::NotConfigured` if the API key is not set.
    #[allow(clippy::disallowed_methods)] // env::var is needed for API key loading
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| ProviderError::NotConfigured {
            provider: PROVIDER.to_string(),
            message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
        })?;

        Ok(Self::with_api_key(api_key))
    }

    /// Creates a new `AnthropicProvider` with a custom API key.
    #[must_use]
    pub fn with_api_key(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Creates a new `AnthropicProvider` against a custom endpoint.
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), client: Client::new() }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        parameters: &ModelParameters,
    ) -> Result<ProviderResponse, ProviderError> {
        debug!(model_id = %model, prompt_len = prompt.len(), "AnthropicProvider generating completion");

        let url = format!("{}/messages", self.base_url);
        let request_body = AnthropicRequest {
            model: model.to_string(),
            messages: vec![AnthropicMessage { role: "user".to_string(), content: prompt.to_string() }],
            max_tokens: parameters.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: parameters.temperature,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        let response = check_status(PROVIDER, response).await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let anthropic_response: AnthropicResponse = decode_json(PROVIDER, response).await?;

        let content = anthropic_response
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            warn!(model_id = %model, "No text content in Anthropic API response");
        }

        let usage = ModelUsage::new(anthropic_response.usage.input_tokens, anthropic_response.usage.output_tokens);

        Ok(ProviderResponse { content, model_id: model.to_string(), usage, latency_ms: Some(latency_ms) })
    }
}

// Anthropic API request/response structures

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
