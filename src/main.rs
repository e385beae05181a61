//! vigil — request-time threat detection and mitigation engine.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────────┐
//!                        │                 THREAT ENGINE                  │
//!                        │                                                │
//!   RequestContext       │  ┌──────────┐   ┌───────────┐   ┌──────────┐  │
//!   ─────────────────────┼─▶│reputation│──▶│abuse-rate │──▶│signature │  │
//!   POST /v1/evaluate    │  │   gate   │   │  guard    │   │ detector │  │
//!                        │  └──────────┘   └───────────┘   └────┬─────┘  │
//!                        │                                      ▼        │
//!                        │  ┌──────────┐   ┌───────────┐   ┌──────────┐  │
//!   Evaluation           │  │ decision │◀──│  anomaly  │◀──│  threat  │  │
//!   ◀────────────────────┼──│ pipeline │   │ detector  │   │  scorer  │  │
//!                        │  └──────────┘   └───────────┘   └──────────┘  │
//!                        │                                                │
//!                        │  ┌──────────────────────────────────────────┐ │
//!                        │  │          Cross-Cutting Concerns          │ │
//!                        │  │  config · shared store · persistence ·   │ │
//!                        │  │  observability · lifecycle · admin API   │ │
//!                        │  └──────────────────────────────────────────┘ │
//!                        └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::net::TcpListener;

use vigil::config::{load_config, ConfigHandle, ConfigWatcher, EngineConfig};
use vigil::http::EngineServer;
use vigil::lifecycle::Shutdown;
use vigil::observability::{logging, metrics};
use vigil::persist::memory::MemoryActivityStore;
use vigil::persist::retry::RetryWriter;
use vigil::pipeline::{ThreatEngine, TracingAuditSink};
use vigil::signature::PatternSet;
use vigil::store::memory::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("vigil v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        guard_per_ip_limit = config.guard.per_ip_limit,
        scorer_threshold = config.scorer.block_threshold,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let sweep_interval = Duration::from_secs(config.counters.sweep_interval_secs);

    // Compile the signature tables once; swapped on reload.
    let patterns = Arc::new(ArcSwap::from_pointee(if config.signature.patterns.is_empty() {
        PatternSet::builtin()
    } else {
        PatternSet::compile(&config.signature.patterns)?
    }));

    // Shared stores. The activity store persists the blacklist when a
    // path is configured.
    let activity = Arc::new(match &config.reputation.blacklist_path {
        Some(path) => MemoryActivityStore::load_from_file(path)?,
        None => MemoryActivityStore::new(None),
    });
    let shared = Arc::new(MemoryStore::new());
    let handle: ConfigHandle = Arc::new(ArcSwap::from_pointee(config));

    let (engine, retry_rx) = ThreatEngine::new(
        handle.clone(),
        patterns.clone(),
        shared.clone(),
        activity.clone(),
        Arc::new(TracingAuditSink),
    );
    let engine = Arc::new(engine);

    // Background tasks.
    let shutdown = Shutdown::new();

    let sweeper_store = shared.clone();
    let sweeper_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        sweeper_store.run_sweeper(sweep_interval, sweeper_shutdown).await;
    });

    let refresher = vigil::anomaly::ProfileRefresher::new(
        engine.profiles().clone(),
        activity.clone(),
        handle.clone(),
    );
    tokio::spawn(refresher.run(shutdown.subscribe()));

    let retry_writer = RetryWriter::new(activity.clone(), retry_rx);
    tokio::spawn(retry_writer.run(shutdown.subscribe()));

    // Hot reload: validated snapshots swap in; pattern tables recompile.
    let mut watcher_guard = None;
    if let Some(path) = &config_path {
        let (watcher, mut updates) = ConfigWatcher::new(path);
        watcher_guard = Some(watcher.run()?);
        let reload_handle = handle.clone();
        let reload_patterns = patterns.clone();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                let table = if new_config.signature.patterns.is_empty() {
                    PatternSet::builtin()
                } else {
                    match PatternSet::compile(&new_config.signature.patterns) {
                        Ok(table) => table,
                        Err(e) => {
                            tracing::error!(error = %e, "Reloaded patterns rejected");
                            continue;
                        }
                    }
                };
                reload_patterns.store(Arc::new(table));
                reload_handle.store(Arc::new(new_config));
                tracing::info!("Configuration applied");
            }
        });
    }

    let listener = TcpListener::bind(&bind_address).await?;
    let server = EngineServer::new(handle, engine);
    server.run(listener).await?;

    // Stop background tasks and persist the blacklist.
    shutdown.trigger();
    drop(watcher_guard);
    if let Err(e) = activity.save_to_file() {
        tracing::warn!(error = %e, "Failed to persist blacklist on shutdown");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
