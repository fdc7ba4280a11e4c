//! Completion orchestrator.
//!
//! Sequences one request: score, route once, then try candidates in the
//! router's fallback order until one answers. The router names providers;
//! this layer is the only one that calls them.

use super::cache::{cache_key, ResponseCache};
use super::error::{CompletionError, Result};
use super::metrics::{CompletionRecord, MetricsCollector};
use super::pricing::PricingTable;
use super::tags::{detect_tags, merge_tags};
use super::types::{Attempt, CompletionResponse, RoutingSummary, UsageStats};
use crate::routing::{BandPolicyStore, Candidate, CompletionRequest, PolicyHandle, Router, RoutingDecision};
use lattice_abstraction::{ModelParameters, Provider, ProviderError, ProviderResponse};
use lattice_models::ProviderRegistry;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Upper bound accepted for `temperature`.
const MAX_TEMPERATURE: f32 = 2.0;

/// Configuration for the completion orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-attempt provider timeout. A timed-out attempt falls back like any
    /// other transient failure.
    pub provider_timeout: Duration,
    /// Parameters used where the request leaves them unset.
    pub default_parameters: ModelParameters,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { provider_timeout: Duration::from_secs(60), default_parameters: ModelParameters::default() }
    }
}

/// Wires the router to providers, cache, pricing and metrics.
pub struct CompletionOrchestrator {
    policy: Arc<PolicyHandle>,
    providers: Arc<ProviderRegistry>,
    cache: Option<Arc<ResponseCache>>,
    pricing: Arc<PricingTable>,
    metrics: Arc<MetricsCollector>,
    config: OrchestratorConfig,
}

impl CompletionOrchestrator {
    /// Creates an orchestrator with no cache, empty pricing and fresh metrics.
    #[must_use]
    pub fn new(policy: Arc<PolicyHandle>, providers: Arc<ProviderRegistry>) -> Self {
        Self {
            policy,
            providers,
            cache: None,
            pricing: Arc::new(PricingTable::default()),
            metrics: Arc::new(MetricsCollector::new()),
            config: OrchestratorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = pricing;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// The live policy handle.
    #[must_use]
    pub fn policy(&self) -> &Arc<PolicyHandle> {
        &self.policy
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    #[must_use]
    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Serves one completion request.
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty prompt or out-of-range parameters
    /// - `Routing` for unknown bands, unknown or partial overrides, and
    ///   exhausted fallback lists
    /// - `Provider` for terminal provider failures
    /// - `ProviderNotRegistered` when the policy names a provider with no adapter
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let result = self.run(&request).await;
        if let Err(e) = &result {
            self.metrics.record_failure(e.error_type());
            warn!(error_type = e.error_type(), status = e.status_code(), error = %e, "completion failed");
        }
        result
    }

    async fn run(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(CompletionError::InvalidRequest("prompt is required".to_string()));
        }
        let parameters = self.parameters(request)?;

        // One snapshot for the whole request, so a reload never mixes policies.
        let policy = self.policy.snapshot();
        let score = policy.scorer().score(prompt);
        let router = Router::new(&policy);
        let mut decision = router.route(request, &score)?;

        let prompt_tags = detect_tags(prompt);
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut cache_consulted = false;

        loop {
            let candidate = decision.candidate();
            let key = self.cache.as_ref().map(|_| {
                cache_key(prompt, &candidate.provider, &candidate.model, decision.effective_band.as_deref())
            });

            if let (Some(cache), Some(key)) = (&self.cache, &key) {
                cache_consulted = true;
                if let Some(cached) = cache.get(key) {
                    return Ok(self.serve_cached(cached, &prompt_tags, &decision));
                }
            }

            let provider = self
                .providers
                .get(&candidate.provider)
                .ok_or_else(|| CompletionError::ProviderNotRegistered { provider: candidate.provider.clone() })?;

            let started = Instant::now();
            match self.invoke(provider.as_ref(), &candidate, prompt, &parameters).await {
                Ok(reply) => {
                    let measured_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let response =
                        self.build_response(reply, measured_ms, &policy, &decision, &prompt_tags, attempts);

                    if let (Some(cache), Some(key)) = (&self.cache, key) {
                        cache.put(key, response.clone());
                    }
                    if cache_consulted {
                        self.metrics.record_cache_miss();
                    }
                    self.record(&response, &decision);

                    info!(
                        provider = %response.provider,
                        model = %response.model,
                        band = ?response.band,
                        reason = %response.routing_reason,
                        latency_ms = response.latency_ms,
                        cache = "miss",
                        "completion succeeded"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        error_type = e.error_type(),
                        error = %e,
                        "provider failure"
                    );
                    attempts.push(Attempt::failed(&candidate, &e));
                    decision = router.next_fallback(&decision, &candidate)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn parameters(&self, request: &CompletionRequest) -> Result<ModelParameters> {
        if request.max_tokens == Some(0) {
            return Err(CompletionError::InvalidRequest("max_tokens must be greater than 0".to_string()));
        }
        if let Some(t) = request.temperature {
            if !(0.0..=MAX_TEMPERATURE).contains(&t) {
                return Err(CompletionError::InvalidRequest(format!(
                    "temperature must be between 0 and {}",
                    MAX_TEMPERATURE
                )));
            }
        }

        let defaults = &self.config.default_parameters;
        Ok(ModelParameters {
            temperature: request.temperature.or(defaults.temperature),
            max_tokens: request.max_tokens.or(defaults.max_tokens),
        })
    }

    async fn invoke(
        &self,
        provider: &dyn Provider,
        candidate: &Candidate,
        prompt: &str,
        parameters: &ModelParameters,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let limit = self.config.provider_timeout;
        debug!(provider = %candidate.provider, model = %candidate.model, prompt_chars = prompt.len(), "invoking provider");

        match timeout(limit, provider.complete(&candidate.model, prompt, parameters)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: candidate.provider.clone(),
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn build_response(
        &self,
        reply: ProviderResponse,
        measured_ms: f64,
        policy: &BandPolicyStore,
        decision: &RoutingDecision,
        prompt_tags: &[String],
        attempts: Vec<Attempt>,
    ) -> CompletionResponse {
        let usage = UsageStats::from(reply.usage);
        let cost = self.pricing.cost(&decision.provider, &decision.model, usage.input_tokens, usage.output_tokens);
        let tags = merge_tags([prompt_tags, detect_tags(&reply.content).as_slice()]);
        let latency_ms = reply.latency_ms.filter(|ms| *ms > 0.0).unwrap_or(measured_ms);

        CompletionResponse {
            text: reply.content,
            provider: decision.provider.clone(),
            model: decision.model.clone(),
            band: decision.effective_band.clone(),
            routing_reason: decision.reason.to_string(),
            complexity_score: decision.complexity_score,
            latency_ms,
            usage,
            cost,
            tags,
            cached: false,
            routing: RoutingSummary {
                reason: decision.reason.to_string(),
                candidates: band_candidates(policy, decision),
                chosen: decision.candidate(),
                attempts,
            },
        }
    }

    fn serve_cached(
        &self,
        cached: CompletionResponse,
        prompt_tags: &[String],
        decision: &RoutingDecision,
    ) -> CompletionResponse {
        let response_tags = detect_tags(&cached.text);
        let tags = merge_tags([prompt_tags, response_tags.as_slice(), cached.tags.as_slice()]);
        let response = CompletionResponse { tags, cached: true, ..cached };

        self.metrics.record_cache_hit();
        self.record(&response, decision);
        info!(
            provider = %response.provider,
            model = %response.model,
            band = ?response.band,
            cache = "hit",
            "completion succeeded"
        );
        response
    }

    fn record(&self, response: &CompletionResponse, decision: &RoutingDecision) {
        self.metrics.record_completion(&CompletionRecord {
            provider: &response.provider,
            model: &response.model,
            band: response.band.as_deref(),
            latency_ms: response.latency_ms,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            total_cost: response.cost.total_cost,
            tag_count: response.tags.len(),
            escalated: decision.was_escalated(),
            fallbacks: decision.tried.len().saturating_sub(1),
        });
    }
}

impl std::fmt::Debug for CompletionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionOrchestrator")
            .field("providers", &self.providers)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Candidates the request could have been served by.
fn band_candidates(policy: &BandPolicyStore, decision: &RoutingDecision) -> Vec<Candidate> {
    decision
        .effective_band
        .as_deref()
        .and_then(|band| policy.resolve(band).ok())
        .map_or_else(|| vec![decision.candidate()], |band| band.candidates.clone())
}
