//! NFT Bridge Orchestrator - status service
//!
//! Serves bridge transaction history for status polling, watches the
//! configured chains and vault pause state, and exposes Prometheus metrics.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use nft_bridge_orchestrator::api::{self, AppState};
use nft_bridge_orchestrator::chain::{ChainManager, ChainRegistry, PauseOracle, VaultPauseOracle};
use nft_bridge_orchestrator::config::Settings;
use nft_bridge_orchestrator::metrics::{self, MetricsServer};
use nft_bridge_orchestrator::state::{MemoryTransactionStore, PgTransactionStore, TransactionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!(
        "Starting NFT Bridge Orchestrator v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} chains and {} routes (instance {})",
        settings.enabled_chains().len(),
        settings.routes.len(),
        settings.orchestrator.instance_id
    );

    // History store: PostgreSQL when configured, memory otherwise
    let store: Arc<dyn TransactionStore> = match &settings.database {
        Some(database) => {
            let store = PgTransactionStore::new(database)
                .await
                .context("Failed to connect to database")?;
            store.run_migrations().await?;
            info!("Database connection established");
            Arc::new(store)
        }
        None => {
            warn!("No [database] configured, history is kept in memory");
            Arc::new(MemoryTransactionStore::new())
        }
    };

    // Initialize chain manager (handles all chain connections)
    let chain_manager =
        Arc::new(ChainManager::new(&settings).context("Failed to initialize chain providers")?);
    let registry = Arc::new(ChainRegistry::from_settings(&settings));
    info!(
        "Chain connections initialized: {:?}",
        chain_manager.connected_chains()
    );

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let state = AppState {
            store: store.clone(),
            registry: registry.clone(),
            chain_manager: Some(chain_manager.clone()),
        };
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Health and pause-state loop
    let health_handle = tokio::spawn({
        let chain_manager = chain_manager.clone();
        let store = store.clone();
        let pause_oracle = VaultPauseOracle::new(chain_manager.clone(), registry.clone());
        let interval = settings.orchestrator.poll_interval_ms.max(1000) * 10;
        async move {
            loop {
                let mut healthy = true;

                let health = chain_manager.health_check().await;
                healthy &= health.iter().all(|(_, ok)| *ok);

                if let Err(e) = store.health_check().await {
                    warn!("History store health check failed: {}", e);
                    healthy = false;
                }

                match pause_oracle.is_paused().await {
                    Ok(paused) => {
                        if paused {
                            warn!("Bridge is paused");
                        }
                        metrics::record_pause_check(paused);
                    }
                    Err(e) => warn!("Pause check failed: {}", e),
                }

                if healthy {
                    metrics::record_health_check();
                } else {
                    metrics::record_health_check_failure();
                }

                tokio::time::sleep(tokio::time::Duration::from_millis(interval)).await;
            }
        }
    });

    info!("NFT Bridge Orchestrator is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("NFT Bridge Orchestrator stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,nft_bridge_orchestrator=debug,sqlx=warn,hyper=warn")
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
