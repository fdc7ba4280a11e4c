//! Google Gemini provider implementation.
//!
//! This module provides an implementation of the `Provider` trait for Google's Gemini API.

use async_trait::async_trait;
use lattice_abstraction::{ModelParameters, ModelUsage, Provider, ProviderError, ProviderResponse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Instant;
use tracing::{debug, warn};

use crate::status::{check_status, decode_json, transport_error};

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider implementation.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Gemini API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider` from `GEMINI_API_KEY`.
    ///
    /// # Errors
    /// Returns `ProviderError::NotConfigured` if the API key is not found in environment variables.
    #[allow(clippy::disallowed_methods)] // env::var is needed for API key loading
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| ProviderError::NotConfigured {
            provider: PROVIDER.to_string(),
            message: "GEMINI_API_KEY environment variable not set".to_string(),
        })?;

        Ok(Self::with_api_key(api_key))
    }

    /// Creates a new `GeminiProvider` with a custom API key.
    #[must_use]
    pub fn with_api_key(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Creates a new `GeminiProvider` against a custom endpoint.
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), client: Client::new() }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        parameters: &ModelParameters,
    ) -> Result<ProviderResponse, ProviderError> {
        debug!(model_id = %model, prompt_len = prompt.len(), "GeminiProvider generating completion");

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: prompt.to_string() }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: parameters.temperature,
                max_output_tokens: parameters.max_tokens,
            }),
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        let response = check_status(PROVIDER, response).await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let gemini_response: GeminiResponse = decode_json(PROVIDER, response).await?;

        let content = gemini_response
            .candidates
            .first()
            .map(|candidate| {
                candidate.content.parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("")
            })
            .unwrap_or_default();
        if gemini_response.candidates.is_empty() {
            warn!(model_id = %model, "No candidates in Gemini API response");
        }

        let usage = gemini_response
            .usage_metadata
            .map(|meta| {
                ModelUsage::new(meta.prompt_token_count.unwrap_or(0), meta.candidates_token_count.unwrap_or(0))
            })
            .unwrap_or_default();

        Ok(ProviderResponse { content, model_id: model.to_string(), usage, latency_ms: Some(latency_ms) })
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)] // Matches API naming
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_complete_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "candidates": [{"content": {"role": "model", "parts": [{"text": "Bonjour"}]}}],
                    "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
                }"#,
            )
            .create_async()
            .await;

        let provider =
            GeminiProvider::with_base_url("test-key".to_string(), format!("{}/v1beta", server.url()));
        let response =
            provider.complete("gemini-1.5-flash", "Say hi in French", &ModelParameters::default()).await.unwrap();

        assert_eq!(response.content, "Bonjour");
        assert_eq!(response.usage, ModelUsage::new(3, 2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_candidates_yield_empty_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::with_base_url("k".to_string(), format!("{}/v1beta", server.url()));
        let response = provider.complete("gemini-1.5-pro", "hi", &ModelParameters::default()).await.unwrap();

        assert!(response.content.is_empty());
        assert_eq!(response.usage.total_tokens, 0);
    }
}
