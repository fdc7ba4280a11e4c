//! In-process response cache with a fixed time-to-live.

use super::types::CompletionResponse;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Builds the cache key for a prompt served by `provider/model` in `band`.
///
/// The key is the SHA-256 of a canonical JSON object with sorted keys, so the
/// same inputs always hash the same regardless of field order.
#[must_use]
pub fn cache_key(prompt: &str, provider: &str, model: &str, band: Option<&str>) -> String {
    let mut fields = BTreeMap::new();
    fields.insert("band", band.map_or(Value::Null, |b| Value::String(b.to_string())));
    fields.insert("model", Value::String(model.to_string()));
    fields.insert("prompt", Value::String(prompt.trim().to_string()));
    fields.insert("provider", Value::String(provider.to_lowercase()));

    // Serializing a map of strings cannot fail.
    let canonical = serde_json::to_string(&fields).unwrap_or_default();
    format!("exact:{:x}", Sha256::digest(canonical.as_bytes()))
}

struct Entry {
    response: CompletionResponse,
    expires_at: Instant,
}

/// TTL cache of completion responses.
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a live entry, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<CompletionResponse> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.response.clone()),
            Some(_) => {
                entries.remove(key);
                debug!("Cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Stores `response` under `key`, replacing any previous entry.
    pub fn put(&self, key: String, response: CompletionResponse) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(key, Entry { response, expires_at });
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache").field("ttl", &self.ttl).field("entries", &self.len()).finish()
    }
}
