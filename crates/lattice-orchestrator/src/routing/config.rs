//! Band policy store and its configuration file format.

use super::complexity::ComplexityScorer;
use super::types::{BandPolicy, Candidate, RoutingError, ScorerWeights};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error.
    #[error("Failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// File watcher could not be set up.
    #[error("Failed to watch configuration file: {0}")]
    Watch(#[from] notify::Error),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Escalation order used when the file does not declare one.
pub const DEFAULT_BAND_ORDER: [&str; 3] = ["low", "mid", "high"];

/// Aliases applied when their target band is configured.
const DEFAULT_ALIASES: [(&str, &str); 5] =
    [("simple", "low"), ("moderate", "mid"), ("medium", "mid"), ("complex", "high"), ("long_context", "high")];

/// Band policy file as written on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    /// Free-form policy version, echoed by the health endpoint.
    #[serde(default)]
    pub version: Option<String>,

    /// Band used when a request names none.
    #[serde(default)]
    pub default_band: Option<String>,

    /// Escalation order, lowest first.
    #[serde(default)]
    pub band_order: Option<Vec<String>>,

    /// Extra band name aliases (alias → band).
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Complexity scorer weights.
    #[serde(default)]
    pub scorer: ScorerWeights,

    /// Band definitions.
    #[serde(default)]
    pub bands: Vec<BandConfig>,
}

/// One `[[bands]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandConfig {
    /// Band name.
    pub name: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,

    /// Escalation threshold in `[0, 1]`.
    #[serde(default)]
    pub escalation_threshold: Option<f64>,

    /// Ordered candidates.
    #[serde(default)]
    pub candidates: Vec<CandidateConfig>,
}

/// One `[[bands.candidates]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateConfig {
    /// Provider tag.
    #[serde(default)]
    pub provider: String,

    /// Model identifier.
    #[serde(default)]
    pub model: String,

    /// Optional weight.
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Validated, immutable band policy.
///
/// Built once from a [`PolicyFile`]; hot reload replaces the whole store.
#[derive(Debug, Clone)]
pub struct BandPolicyStore {
    version: Option<String>,
    default_band: String,
    band_order: Vec<String>,
    aliases: BTreeMap<String, String>,
    bands: Vec<BandPolicy>,
    index: HashMap<String, usize>,
    known_pairs: HashSet<(String, String)>,
    scorer: ComplexityScorer,
}

impl BandPolicyStore {
    /// Loads a band policy from a TOML file, or JSON when the extension is `.json`.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store = if is_json(path) { Self::from_json_str(&content)? } else { Self::from_toml_str(&content)? };

        info!(
            path = %path.display(),
            bands = store.bands.len(),
            version = ?store.version,
            "Loaded band policy"
        );
        Ok(store)
    }

    /// Parses and validates a TOML policy.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_config(toml::from_str(content)?)
    }

    /// Parses and validates a JSON policy.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::from_config(serde_json::from_str(content)?)
    }

    /// Validates a parsed policy file and builds the store.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn from_config(config: PolicyFile) -> Result<Self> {
        if config.bands.is_empty() {
            return Err(ConfigError::Validation("At least one band must be configured".to_string()));
        }

        validate_weights(&config.scorer)?;

        let mut bands = Vec::with_capacity(config.bands.len());
        let mut index = HashMap::new();
        let mut known_pairs = HashSet::new();

        for band in config.bands {
            let name = normalise(&band.name);
            if name.is_empty() {
                return Err(ConfigError::Validation("Band name must not be empty".to_string()));
            }
            if index.contains_key(&name) {
                return Err(ConfigError::Validation(format!("Duplicate band name '{}'", name)));
            }
            if band.candidates.is_empty() {
                return Err(ConfigError::Validation(format!("Band '{}' must have at least one candidate", name)));
            }
            if let Some(threshold) = band.escalation_threshold {
                if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
                    return Err(ConfigError::Validation(format!(
                        "Band '{}': escalation_threshold {} must be between 0.0 and 1.0",
                        name, threshold
                    )));
                }
            }

            let mut candidates = Vec::with_capacity(band.candidates.len());
            for (idx, raw) in band.candidates.into_iter().enumerate() {
                let candidate = Candidate { weight: raw.weight, ..Candidate::new(raw.provider, raw.model) };
                if candidate.provider.is_empty() {
                    return Err(ConfigError::Validation(format!("Band '{}' candidate {}: missing provider", name, idx)));
                }
                if candidate.model.is_empty() {
                    return Err(ConfigError::Validation(format!("Band '{}' candidate {}: missing model", name, idx)));
                }
                if let Some(weight) = candidate.weight {
                    if !weight.is_finite() || weight < 0.0 {
                        return Err(ConfigError::Validation(format!(
                            "Band '{}' candidate {}: weight {} must be a non-negative number",
                            name, idx, weight
                        )));
                    }
                }
                known_pairs.insert((candidate.provider.clone(), candidate.model.clone()));
                candidates.push(candidate);
            }

            index.insert(name.clone(), bands.len());
            bands.push(BandPolicy {
                name,
                description: band.description,
                candidates,
                escalation_threshold: band.escalation_threshold,
            });
        }

        let band_order = match config.band_order {
            Some(order) => {
                let order: Vec<String> = order.iter().map(|b| normalise(b)).collect();
                let mut seen = HashSet::new();
                for band in &order {
                    if !index.contains_key(band) {
                        return Err(ConfigError::Validation(format!("band_order references unknown band '{}'", band)));
                    }
                    if !seen.insert(band.as_str()) {
                        return Err(ConfigError::Validation(format!("band_order lists '{}' more than once", band)));
                    }
                }
                order
            }
            None => DEFAULT_BAND_ORDER.iter().map(|b| (*b).to_string()).collect(),
        };

        let default_band = match config.default_band {
            Some(band) => {
                let band = normalise(&band);
                if !index.contains_key(&band) {
                    return Err(ConfigError::Validation(format!("default_band '{}' is not a configured band", band)));
                }
                band
            }
            None if index.contains_key("low") => "low".to_string(),
            None => bands[0].name.clone(),
        };

        let mut aliases: BTreeMap<String, String> = DEFAULT_ALIASES
            .iter()
            .filter(|(_, target)| index.contains_key(*target))
            .map(|(alias, target)| ((*alias).to_string(), (*target).to_string()))
            .collect();
        for (alias, target) in config.aliases {
            let (alias, target) = (normalise(&alias), normalise(&target));
            if !index.contains_key(&target) {
                return Err(ConfigError::Validation(format!("Alias '{}' targets unknown band '{}'", alias, target)));
            }
            aliases.insert(alias, target);
        }

        debug!(
            bands = bands.len(),
            default_band = %default_band,
            band_order = ?band_order,
            aliases = aliases.len(),
            "Validated band policy"
        );

        Ok(Self {
            version: config.version,
            default_band,
            band_order,
            aliases,
            bands,
            index,
            known_pairs,
            scorer: ComplexityScorer::with_weights(config.scorer),
        })
    }

    /// Resolves a band (or alias) name to its policy. Matching is case-insensitive.
    ///
    /// # Errors
    /// Returns `RoutingError::UnknownBand` if neither a band nor an alias matches.
    pub fn resolve(&self, band_name: &str) -> std::result::Result<&BandPolicy, RoutingError> {
        let key = normalise(band_name);
        let idx = self
            .index
            .get(&key)
            .or_else(|| self.aliases.get(&key).and_then(|target| self.index.get(target)))
            .ok_or_else(|| RoutingError::UnknownBand { band: band_name.to_string() })?;
        Ok(&self.bands[*idx])
    }

    /// Every (provider, model) pair listed by any band.
    #[must_use]
    pub fn all_known_pairs(&self) -> &HashSet<(String, String)> {
        &self.known_pairs
    }

    /// Returns `true` if some band lists `provider`/`model`. Provider is matched case-insensitively.
    #[must_use]
    pub fn is_known_pair(&self, provider: &str, model: &str) -> bool {
        self.known_pairs.contains(&(normalise(provider), model.trim().to_string()))
    }

    /// The band used when a request names none.
    #[must_use]
    pub fn default_band(&self) -> &str {
        &self.default_band
    }

    /// The band one step above `band_name` in the escalation order, if configured.
    #[must_use]
    pub fn next_band(&self, band_name: &str) -> Option<&BandPolicy> {
        let key = normalise(band_name);
        let pos = self.band_order.iter().position(|b| *b == key)?;
        let next = self.band_order.get(pos + 1)?;
        self.index.get(next).map(|idx| &self.bands[*idx])
    }

    /// Bands in file order.
    #[must_use]
    pub fn bands(&self) -> &[BandPolicy] {
        &self.bands
    }

    /// Escalation order, lowest first.
    #[must_use]
    pub fn band_order(&self) -> &[String] {
        &self.band_order
    }

    /// Effective aliases (alias → band).
    #[must_use]
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Policy version, if the file declares one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Scorer configured by this policy.
    #[must_use]
    pub fn scorer(&self) -> &ComplexityScorer {
        &self.scorer
    }
}

fn normalise(name: &str) -> String {
    name.trim().to_lowercase()
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn validate_weights(weights: &ScorerWeights) -> Result<()> {
    for (name, weight) in weights.entries() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigError::Validation(format!(
                "Scorer weight '{}' must be a non-negative number, got {}",
                name, weight
            )));
        }
    }
    if weights.total() <= 0.0 {
        return Err(ConfigError::Validation("At least one scorer weight must be positive".to_string()));
    }
    Ok(())
}
