//! Process-wide completion metrics.
//!
//! Counters are only changed through the `record_*` methods; readers get a
//! copied [`MetricsSnapshot`].

use super::pricing::round8;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// One successful completion as seen by the metrics collector.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRecord<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub band: Option<&'a str>,
    pub latency_ms: f64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_cost: f64,
    /// Number of sensitive-content tags on the response.
    pub tag_count: usize,
    pub escalated: bool,
    /// Failed attempts before the serving candidate.
    pub fallbacks: usize,
}

#[derive(Debug, Default)]
struct Aggregates {
    total_cost: f64,
    latency_sum_ms: f64,
    providers: BTreeMap<String, u64>,
    models: BTreeMap<String, u64>,
    bands: BTreeMap<String, u64>,
    failures: BTreeMap<String, u64>,
}

/// Aggregate metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_cost: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub average_latency_ms: f64,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub pii_detected_total: u64,
    pub escalations_total: u64,
    pub fallbacks_total: u64,
    pub providers: BTreeMap<String, u64>,
    pub models: BTreeMap<String, u64>,
    pub bands: BTreeMap<String, u64>,
    /// Failed requests by error type.
    pub failures: BTreeMap<String, u64>,
}

/// Thread-safe metrics collector, created once at startup and shared by `Arc`.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    total_requests: AtomicU64,
    total_failures: AtomicU64,
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    pii_detected: AtomicU64,
    escalations: AtomicU64,
    fallbacks: AtomicU64,
    aggregates: Mutex<Aggregates>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a served request.
    pub fn record_completion(&self, record: &CompletionRecord<'_>) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_input_tokens.fetch_add(u64::from(record.input_tokens), Ordering::Relaxed);
        self.total_output_tokens.fetch_add(u64::from(record.output_tokens), Ordering::Relaxed);
        if record.tag_count > 0 {
            self.pii_detected.fetch_add(1, Ordering::Relaxed);
        }
        if record.escalated {
            self.escalations.fetch_add(1, Ordering::Relaxed);
        }
        self.fallbacks.fetch_add(record.fallbacks as u64, Ordering::Relaxed);

        let mut aggregates = self.aggregates.lock().unwrap_or_else(PoisonError::into_inner);
        aggregates.total_cost += record.total_cost;
        aggregates.latency_sum_ms += record.latency_ms;
        bump(&mut aggregates.providers, record.provider);
        bump(&mut aggregates.models, record.model);
        if let Some(band) = record.band {
            bump(&mut aggregates.bands, band);
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request that ended in an error of type `error_type`.
    pub fn record_failure(&self, error_type: &str) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut aggregates = self.aggregates.lock().unwrap_or_else(PoisonError::into_inner);
        bump(&mut aggregates.failures, error_type);
    }

    /// Copies the current values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let aggregates = self.aggregates.lock().unwrap_or_else(PoisonError::into_inner);
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let average_latency_ms = if total_requests == 0 {
            0.0
        } else {
            round_to(aggregates.latency_sum_ms / total_requests as f64, 4)
        };

        MetricsSnapshot {
            total_requests,
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_cost: round8(aggregates.total_cost),
            total_input_tokens: self.total_input_tokens.load(Ordering::Relaxed),
            total_output_tokens: self.total_output_tokens.load(Ordering::Relaxed),
            average_latency_ms,
            cache_hits_total: self.cache_hits.load(Ordering::Relaxed),
            cache_misses_total: self.cache_misses.load(Ordering::Relaxed),
            pii_detected_total: self.pii_detected.load(Ordering::Relaxed),
            escalations_total: self.escalations.load(Ordering::Relaxed),
            fallbacks_total: self.fallbacks.load(Ordering::Relaxed),
            providers: aggregates.providers.clone(),
            models: aggregates.models.clone(),
            bands: aggregates.bands.clone(),
            failures: aggregates.failures.clone(),
        }
    }
}

fn bump(bucket: &mut BTreeMap<String, u64>, key: &str) {
    if key.is_empty() {
        return;
    }
    *bucket.entry(key.to_string()).or_insert(0) += 1;
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}
