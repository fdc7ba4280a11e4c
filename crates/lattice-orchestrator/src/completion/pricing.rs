//! Per-model pricing and cost computation.

use crate::routing::config::{is_json, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Model entry matching every model of a provider.
pub const WILDCARD_MODEL: &str = "*";

/// Unit a price is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    /// Price per 1,000 tokens.
    #[serde(rename = "per_1k")]
    Per1k,
    /// Price per 1,000,000 tokens.
    #[default]
    PerMillion,
}

impl PriceUnit {
    fn tokens(self) -> f64 {
        match self {
            Self::Per1k => 1_000.0,
            Self::PerMillion => 1_000_000.0,
        }
    }
}

/// Input and output price of one model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelPrice {
    /// Price of input tokens per `unit`.
    pub input: f64,
    /// Price of output tokens per `unit`.
    pub output: f64,
    /// Unit both prices are quoted in.
    pub unit: PriceUnit,
}

/// Cost of a single completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub currency: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub pricing_version: Option<String>,
}

/// Pricing table keyed by provider, then model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTable {
    /// Currency all prices are quoted in.
    pub currency: String,
    /// Optional version tag reported alongside costs.
    pub version: Option<String>,
    /// `provider -> model -> price`.
    pub providers: HashMap<String, HashMap<String, ModelPrice>>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self { currency: "USD".to_string(), version: None, providers: HashMap::new() }
    }
}

impl PricingTable {
    /// Loads a pricing table from TOML, or JSON when the extension is `.json`.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let table: Self = if is_json(path) { serde_json::from_str(&content)? } else { toml::from_str(&content)? };
        let table = table.normalized()?;

        info!(
            path = %path.display(),
            providers = table.providers.len(),
            version = ?table.version,
            "Loaded pricing table"
        );
        Ok(table)
    }

    /// Parses a TOML pricing table.
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or validated.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(content)?.normalized()
    }

    /// Lowercases provider keys and rejects negative or non-finite prices.
    fn normalized(self) -> Result<Self, ConfigError> {
        let mut providers = HashMap::with_capacity(self.providers.len());
        for (provider, models) in self.providers {
            for (model, price) in &models {
                if !(price.input.is_finite() && price.output.is_finite()) || price.input < 0.0 || price.output < 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "Price for '{}/{}' must be a non-negative number",
                        provider, model
                    )));
                }
            }
            providers.insert(provider.trim().to_lowercase(), models);
        }
        Ok(Self { providers, ..self })
    }

    /// Price for a provider/model, falling back to the provider's `*` entry.
    #[must_use]
    pub fn price(&self, provider: &str, model: &str) -> Option<&ModelPrice> {
        let models = self.providers.get(&provider.to_lowercase())?;
        models.get(model).or_else(|| models.get(WILDCARD_MODEL))
    }

    /// Computes the cost of a completion. Unknown pairs cost nothing but still
    /// report their token counts.
    #[must_use]
    pub fn cost(&self, provider: &str, model: &str, input_tokens: u32, output_tokens: u32) -> CostBreakdown {
        let (input_cost, output_cost) = match self.price(provider, model) {
            Some(price) => {
                let per_token = price.unit.tokens();
                (f64::from(input_tokens) * price.input / per_token, f64::from(output_tokens) * price.output / per_token)
            }
            None => {
                debug!(provider = %provider, model = %model, "No price configured, cost is zero");
                (0.0, 0.0)
            }
        };

        CostBreakdown {
            currency: self.currency.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            input_cost: round8(input_cost),
            output_cost: round8(output_cost),
            total_cost: round8(input_cost + output_cost),
            pricing_version: self.version.clone(),
        }
    }
}

/// Rounds to 8 decimal places.
pub(crate) fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PRICING: &str = r#"
currency = "USD"
version = "test"

[providers.stub.stub-1]
input = 1.0
output = 3.0
unit = "per_1k"

[providers.OpenAI.gpt-4o-mini]
input = 0.15
output = 0.6

[providers.ollama."*"]
input = 0.0
output = 0.0
"#;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_per_1k_cost() {
        let table = PricingTable::from_toml_str(PRICING).unwrap();
        let cost = table.cost("stub", "stub-1", 500, 1000);

        assert_eq!(cost.currency, "USD");
        assert_eq!(cost.pricing_version.as_deref(), Some("test"));
        assert!(approx(cost.input_cost, 0.5));
        assert!(approx(cost.output_cost, 3.0));
        assert!(approx(cost.total_cost, 3.5));
    }

    #[test]
    fn test_per_million_is_default_unit() {
        let table = PricingTable::from_toml_str(PRICING).unwrap();
        let cost = table.cost("openai", "gpt-4o-mini", 1_000_000, 2_000_000);
        assert!(approx(cost.input_cost, 0.15));
        assert!(approx(cost.output_cost, 1.2));
    }

    #[test]
    fn test_unknown_pair_costs_nothing() {
        let table = PricingTable::from_toml_str(PRICING).unwrap();
        let cost = table.cost("missing", "nope", 123, 456);
        assert!(approx(cost.total_cost, 0.0));
        assert_eq!((cost.input_tokens, cost.output_tokens), (123, 456));
    }

    #[test]
    fn test_wildcard_model() {
        let table = PricingTable::from_toml_str(PRICING).unwrap();
        assert!(table.price("ollama", "llama3").is_some());
        assert!(table.price("stub", "stub-2").is_none());
    }

    #[test]
    fn test_rounding() {
        assert!(approx(round8(0.123_456_789_9), 0.123_456_79));
        let table = PricingTable::from_toml_str(PRICING).unwrap();
        let cost = table.cost("openai", "gpt-4o-mini", 1, 1);
        assert!(approx(cost.total_cost, 0.000_000_75));
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let err = PricingTable::from_toml_str("[providers.stub.x]\ninput = -1.0\noutput = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pricing.json");
        std::fs::write(
            &path,
            r#"{"currency":"EUR","providers":{"stub":{"stub-1":{"input":2.0,"output":2.0,"unit":"per_1k"}}}}"#,
        )
        .unwrap();

        let table = PricingTable::load(&path).unwrap();
        assert_eq!(table.currency, "EUR");
        assert!(table.version.is_none());
        assert!(approx(table.cost("stub", "stub-1", 1000, 0).total_cost, 2.0));
    }
}
