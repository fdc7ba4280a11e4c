//! Server settings.
//!
//! Precedence: command-line flag, then `LATTICE_*` environment variable, then
//! the default shown in `--help`. Provider credentials are read by the
//! provider adapters themselves.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Lattice - band-based LLM routing service
///
/// Routes each completion request to a provider/model under a declared
/// cost/quality band, escalating complex prompts and falling back within the
/// band when a provider fails.
#[derive(Parser, Debug, Clone)]
#[command(name = "lattice", author, version, about = "Lattice - band-based LLM routing service")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LATTICE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Band policy file (TOML, or JSON with a .json extension)
    #[arg(long, env = "LATTICE_BANDS_FILE")]
    pub bands_file: PathBuf,

    /// Pricing table (TOML or JSON); costs are zero without one
    #[arg(long, env = "LATTICE_PRICING_FILE")]
    pub pricing_file: Option<PathBuf>,

    /// Response cache time-to-live in seconds
    #[arg(long, env = "LATTICE_CACHE_TTL_SECONDS", default_value_t = 60)]
    pub cache_ttl_secs: u64,

    /// Disable the response cache
    #[arg(long, env = "LATTICE_CACHE_DISABLED")]
    pub cache_disabled: bool,

    /// Per-attempt provider timeout in seconds
    #[arg(long, env = "LATTICE_PROVIDER_TIMEOUT_SECONDS", default_value_t = 60)]
    pub provider_timeout_secs: u64,

    /// Reload the band policy when the file changes
    #[arg(long, env = "LATTICE_WATCH")]
    pub watch: bool,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "LATTICE_CORS_ORIGINS", value_delimiter = ',', default_value = "http://localhost:3000")]
    pub cors_origins: Vec<String>,

    /// Deployment environment reported by /v1/health
    #[arg(long, env = "LATTICE_ENV", default_value = "dev")]
    pub environment: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(short, long, env = "LATTICE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LATTICE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// Cache TTL, or `None` when caching is off.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (!self.cache_disabled && self.cache_ttl_secs > 0).then_some(Duration::from_secs(self.cache_ttl_secs))
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }
}
