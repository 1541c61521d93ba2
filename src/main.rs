use adaptive_source_collector::collector::runner::run_source;
use adaptive_source_collector::config::{Config, load_config};
use adaptive_source_collector::metrics::METRICS;
use adaptive_source_collector::{
    AdaptiveCollectionStrategy, InMemoryMetricsStore, MetricsStore, get_profile,
};

use anyhow::Context;
use log::{error, info, warn};
use rustls::crypto::{CryptoProvider, ring};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Initialize logging and the rustls crypto backend
// - Load configuration
// - Build one strategy per enabled source (explicit injection,
//   no module-level caching)
// - Run one polling worker per source until Ctrl-C
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: Config = load_config(&path)?;

    let default_level = if config.debug_log() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // rustls >= 0.23 requires an explicit CryptoProvider.
    // Installing twice is harmless, so the error is only logged.
    if CryptoProvider::install_default(ring::default_provider()).is_err() {
        warn!("rustls CryptoProvider was already installed");
    }

    // --------------------------------------------------------
    // Metrics store
    //
    // Snapshots live for the lifetime of the process. A durable
    // backend plugs in here through the `MetricsStore` trait.
    // --------------------------------------------------------
    let store: Arc<dyn MetricsStore> = Arc::new(InMemoryMetricsStore::new());

    let client = reqwest::Client::builder()
        .user_agent(concat!("adaptive-source-collector/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("cannot build HTTP client")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // --------------------------------------------------------
    // Periodic metrics reporter (low-noise)
    // --------------------------------------------------------
    tokio::spawn(async {
        loop {
            sleep(Duration::from_secs(10)).await;
            info!("[METRICS] {}", METRICS.summary());
        }
    });

    // --------------------------------------------------------
    // One strategy + worker per enabled source
    // --------------------------------------------------------
    let mut workers = Vec::new();
    for source in config.sources.iter().filter(|s| s.enabled) {
        // validated at load time
        let Some(profile) = get_profile(&source.kind) else {
            error!("Source kind '{}' is not supported", source.kind);
            continue;
        };
        let params = source.strategy_params()?;

        let strategy = AdaptiveCollectionStrategy::new(
            source.name.clone(),
            profile,
            Some(params),
            store.clone(),
        )
        .await?
        .with_persistence_interval(config.persistence.interval);

        info!("Starting {} collector ({})", source.name, source.kind);
        workers.push(tokio::spawn(run_source(
            strategy,
            source.clone(),
            client.clone(),
            shutdown_rx.clone(),
        )));
    }

    if workers.is_empty() {
        warn!("No enabled sources in {}", path);
        return Ok(());
    }

    tokio::signal::ctrl_c().await.context("cannot listen for Ctrl-C")?;
    info!("Shutting down {} collectors", workers.len());
    // Receivers outlive the send; an error only means every worker already exited
    let _ = shutdown_tx.send(true);

    for result in futures_util::future::join_all(workers).await {
        if let Err(e) = result {
            error!("collector task failed: {}", e);
        }
    }

    info!("[METRICS] final {}", METRICS.summary());
    Ok(())
}
