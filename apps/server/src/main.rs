//! Lattice server - Entry Point
//!
//! Loads the band policy, registers the providers whose credentials are
//! present and serves the HTTP API.

mod api;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use lattice_models::ProviderRegistry;
use lattice_orchestrator::{
    CompletionOrchestrator, MetricsCollector, OrchestratorConfig, PolicyHandle, PolicyWatcher, PricingTable,
    ResponseCache,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::AppState;
use config::{Args, LogFormat};

/// How often expired cache entries are purged.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let policy = Arc::new(
        PolicyHandle::load(&args.bands_file)
            .with_context(|| format!("Failed to load band policy from {}", args.bands_file.display()))?,
    );

    let pricing = match &args.pricing_file {
        Some(path) => PricingTable::load(path)
            .with_context(|| format!("Failed to load pricing table from {}", path.display()))?,
        None => {
            warn!("No pricing file configured, all costs will be reported as zero");
            PricingTable::default()
        }
    };

    let providers = ProviderRegistry::from_env();
    info!(providers = ?providers.names(), "Providers registered");

    let mut orchestrator = CompletionOrchestrator::new(Arc::clone(&policy), Arc::new(providers))
        .with_pricing(Arc::new(pricing))
        .with_metrics(Arc::new(MetricsCollector::new()))
        .with_config(OrchestratorConfig { provider_timeout: args.provider_timeout(), ..OrchestratorConfig::default() });

    if let Some(ttl) = args.cache_ttl() {
        let cache = Arc::new(ResponseCache::new(ttl));
        spawn_cache_purge(Arc::clone(&cache));
        orchestrator = orchestrator.with_cache(cache);
        info!(ttl_secs = ttl.as_secs(), "Response cache enabled");
    } else {
        info!("Response cache disabled");
    }

    // Held for the lifetime of the server; dropping it stops reloading.
    let _watcher = if args.watch {
        Some(PolicyWatcher::new(&args.bands_file, Arc::clone(&policy)).context("Failed to watch band policy")?)
    } else {
        None
    };

    let state = AppState { orchestrator: Arc::new(orchestrator), environment: args.environment.clone() };
    let app = api::router(state, &args.cors_origins);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!(addr = %args.bind, environment = %args.environment, "Lattice listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("Server error")?;

    info!("Lattice stopped");
    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn spawn_cache_purge(cache: Arc<ResponseCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = cache.len(), "Purged expired cache entries");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
