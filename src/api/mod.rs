//! HTTP API for health checks and transaction status polling

use crate::chain::{ChainManager, ChainRegistry};
use crate::config::ApiConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::state::{BridgeTransaction, TransactionStore};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use ethers::types::Address;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TransactionStore>,
    pub registry: Arc<ChainRegistry>,
    /// Absent when running without RPC access
    pub chain_manager: Option<Arc<ChainManager>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/chains", get(get_chains))
        .route("/transactions/:address", get(get_transactions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> BridgeResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Internal(format!("Cannot bind {}: {}", addr, e)))?;
    axum::serve(listener, router(state))
        .await
        .map_err(|e| BridgeError::Internal(format!("API server failed: {}", e)))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - history store and, when connected, every chain
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = match state.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            warn!("History store health check failed: {}", e);
            false
        }
    };

    let chain_health = match &state.chain_manager {
        Some(chain_manager) => chain_manager.health_check().await,
        None => Vec::new(),
    };
    let chains_ok = chain_health.iter().all(|(_, healthy)| *healthy);

    let ready = store_ok && chains_ok;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            store: store_ok,
            chains: chains_ok,
            details: chain_health
                .into_iter()
                .map(|(id, h)| ChainHealth {
                    chain_id: id,
                    healthy: h,
                })
                .collect(),
        }),
    )
}

/// Configured chains and the routes between them
async fn get_chains(State(state): State<AppState>) -> impl IntoResponse {
    let mut chains: Vec<ChainSummary> = state
        .registry
        .chains()
        .map(|chain| ChainSummary {
            chain_id: chain.chain_id,
            name: chain.name.clone(),
            explorer_url: chain.explorer_url.clone(),
        })
        .collect();
    chains.sort_by_key(|chain| chain.chain_id);

    let mut routes: Vec<RouteSummary> = state
        .registry
        .routes()
        .map(|route| RouteSummary {
            src_chain_id: route.src_chain_id,
            dest_chain_id: route.dest_chain_id,
            erc721_vault: route.erc721_vault_address,
            erc1155_vault: route.erc1155_vault_address,
        })
        .collect();
    routes.sort_by_key(|route| (route.src_chain_id, route.dest_chain_id));

    Json(ChainsResponse { chains, routes })
}

/// Bridge history of one sender, oldest first
async fn get_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<TransactionsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let address: Address = address.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("invalid address: {}", address),
            }),
        )
    })?;

    match state.store.get_txs_by_address(address).await {
        Ok(transactions) => Ok(Json(TransactionsResponse {
            address,
            transactions,
        })),
        Err(e) => {
            warn!("Failed to load history for {:?}: {}", address, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "history unavailable".to_string(),
                }),
            ))
        }
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    store: bool,
    chains: bool,
    details: Vec<ChainHealth>,
}

#[derive(Serialize)]
struct ChainHealth {
    chain_id: u64,
    healthy: bool,
}

#[derive(Serialize)]
struct ChainSummary {
    chain_id: u64,
    name: String,
    explorer_url: String,
}

#[derive(Serialize)]
struct RouteSummary {
    src_chain_id: u64,
    dest_chain_id: u64,
    erc721_vault: Address,
    erc1155_vault: Address,
}

#[derive(Serialize)]
struct ChainsResponse {
    chains: Vec<ChainSummary>,
    routes: Vec<RouteSummary>,
}

#[derive(Serialize)]
struct TransactionsResponse {
    address: Address,
    transactions: Vec<BridgeTransaction>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
