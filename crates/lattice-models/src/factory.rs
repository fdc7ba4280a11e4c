//! Provider factory and registry.
//!
//! This module creates provider instances by kind, handling API key loading from
//! environment variables, and keeps the name → provider table the orchestrator
//! dispatches through.

use crate::{AnthropicProvider, GeminiProvider, OllamaProvider, OpenAIProvider, StubProvider};
use lattice_abstraction::{Provider, ProviderError};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Provider kind enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Deterministic echo provider.
    Stub,
    /// OpenAI chat completions.
    OpenAI,
    /// Anthropic Messages API.
    Anthropic,
    /// Google Gemini.
    Gemini,
    /// Ollama local server.
    Ollama,
}

impl ProviderKind {
    /// All kinds, in registration order.
    pub const ALL: [Self; 5] = [Self::Stub, Self::OpenAI, Self::Anthropic, Self::Gemini, Self::Ollama];

    /// Canonical lowercase name used in routing tables.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stub" | "mock" | "echo" => Ok(Self::Stub),
            "openai" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" | "local" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Factory for creating provider instances.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates a provider of the given kind from environment configuration.
    ///
    /// # Errors
    /// Returns `ProviderError::NotConfigured` if a hosted provider's API key is missing.
    pub fn create(kind: ProviderKind) -> Result<Arc<dyn Provider>, ProviderError> {
        debug!(provider = %kind, "Creating provider instance");

        match kind {
            ProviderKind::Stub => Ok(Arc::new(StubProvider::new())),
            ProviderKind::OpenAI => Ok(Arc::new(OpenAIProvider::from_env()?)),
            ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::from_env()?)),
            ProviderKind::Gemini => Ok(Arc::new(GeminiProvider::from_env()?)),
            ProviderKind::Ollama => {
                #[allow(clippy::disallowed_methods)] // env::var is needed for endpoint loading
                let provider = env::var("OLLAMA_URL")
                    .map_or_else(|_| OllamaProvider::default(), OllamaProvider::with_base_url);
                Ok(Arc::new(provider))
            }
        }
    }
}

/// Name → provider table.
///
/// Lookups are case-insensitive; names are stored lowercase.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry").field("providers", &self.names()).finish()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from the environment.
    ///
    /// `stub` and `ollama` are always registered; each hosted provider is
    /// registered only when its API key is present.
    #[must_use]
    pub fn from_env() -> Self {
        let mut registry = Self::new();
        for kind in ProviderKind::ALL {
            match ProviderFactory::create(kind) {
                Ok(provider) => registry.register(kind.as_str(), provider),
                Err(e) => info!(provider = %kind, reason = %e, "Provider not registered"),
            }
        }
        registry
    }

    /// Registers (or replaces) a provider under `name`.
    pub fn register(&mut self, name: &str, provider: Arc<dyn Provider>) {
        let key = name.trim().to_lowercase();
        debug!(provider = %key, "Registering provider");
        self.providers.insert(key, provider);
    }

    /// Looks up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(&name.trim().to_lowercase()).cloned()
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
