//! Ollama provider implementation.
//!
//! This module provides an implementation of the `Provider` trait for Ollama's local API.

use async_trait::async_trait;
use lattice_abstraction::{ModelParameters, ModelUsage, Provider, ProviderError, ProviderResponse};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error};

use crate::status::{check_status, decode_json, transport_error};

const PROVIDER: &str = "ollama";

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama provider implementation.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// The base URL for the Ollama API (default: "http://localhost:11434").
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL.to_string())
    }
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider` with a custom base URL.
    ///
    /// # Arguments
    /// * `base_url` - The base URL for the Ollama API (e.g., "http://192.168.1.100:11434")
    #[must_use]
    pub fn with_base_url(base_url: String) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), client: Client::new() }
    }

    /// Returns the server this provider talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// Ollama API request/response structures
#[derive(Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>, // max_tokens equivalent
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

/// Rough token estimate (~4 chars per token, at least 1) for servers that omit eval counts.
#[allow(clippy::cast_possible_truncation)]
fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() / 4).max(1) as u32
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        parameters: &ModelParameters,
    ) -> Result<ProviderResponse, ProviderError> {
        debug!(model_id = %model, prompt_len = prompt.len(), "OllamaProvider generating completion");

        let url = format!("{}/api/generate", self.base_url);
        let request_body = OllamaGenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: parameters.temperature,
                num_predict: parameters.max_tokens,
            }),
        };

        let started = Instant::now();
        let response = self.client.post(&url).json(&request_body).send().await.map_err(|e| {
            if e.is_connect() {
                error!(base_url = %self.base_url, "Ollama server not reachable");
                return ProviderError::Request(format!(
                    "Ollama server not reachable at {}. Start it with 'ollama serve'.",
                    self.base_url
                ));
            }
            transport_error(PROVIDER, &e)
        })?;

        // A missing model is reported as 404 with a JSON body; surface a pull hint.
        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<OllamaError>(&body).map_or(body, |e| e.error);
            return Err(ProviderError::Rejected {
                provider: PROVIDER.to_string(),
                message: format!("Model '{}' not found ({}). Pull it with 'ollama pull {}'.", model, detail, model),
            });
        }

        let response = check_status(PROVIDER, response).await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let ollama_response: OllamaResponse = decode_json(PROVIDER, response).await?;
        let usage = ModelUsage::new(
            ollama_response.prompt_eval_count.unwrap_or_else(|| estimate_tokens(prompt)),
            ollama_response.eval_count.unwrap_or_else(|| estimate_tokens(&ollama_response.response)),
        );

        Ok(ProviderResponse {
            content: ollama_response.response,
            model_id: model.to_string(),
            usage,
            latency_ms: Some(latency_ms),
        })
    }
}
