//! OpenAI provider implementation.
//!
//! This module provides an implementation of the `Provider` trait for OpenAI's
//! chat completions API.

use async_trait::async_trait;
use lattice_abstraction::{ModelParameters, ModelUsage, Provider, ProviderError, ProviderResponse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Instant;
use tracing::debug;

use crate::status::{check_status, decode_json, transport_error};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const SYSTEM_PROMPT: &str = "You are a concise assistant running inside the lattice router.";

/// OpenAI provider implementation.
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the OpenAI API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` from `OPENAI_API_KEY` (and optional `OPENAI_API_BASE`).
    ///
    /// # Errors
    /// Returns `ProviderError::NotConfigured` if the API key is not set.
    #[allow(clippy::disallowed_methods)] // env::var is needed for API key loading
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| ProviderError::NotConfigured {
            provider: PROVIDER.to_string(),
            message: "OPENAI_API_KEY environment variable not set".to_string(),
        })?;
        let base_url = env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::with_base_url(api_key, base_url))
    }

    /// Creates a new `OpenAIProvider` with a custom API key.
    #[must_use]
    pub fn with_api_key(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Creates a new `OpenAIProvider` against a custom endpoint.
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), client: Client::new() }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        parameters: &ModelParameters,
    ) -> Result<ProviderResponse, ProviderError> {
        debug!(model_id = %model, prompt_len = prompt.len(), "OpenAIProvider generating completion");

        let url = format!("{}/chat/completions", self.base_url);
        let request_body = OpenAIRequest {
            model: model.to_string(),
            messages: vec![
                OpenAIMessage { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
                OpenAIMessage { role: "user".to_string(), content: prompt.to_string() },
            ],
            temperature: parameters.temperature,
            max_tokens: parameters.max_tokens,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        let response = check_status(PROVIDER, response).await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let openai_response: OpenAIResponse = decode_json(PROVIDER, response).await?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let usage = openai_response
            .usage
            .map(|u| ModelUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ProviderResponse { content, model_id: model.to_string(), usage, latency_ms: Some(latency_ms) })
    }
}

// OpenAI API request/response structures

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)] // Matches API naming
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
