//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Chain connection status
//! - Approval and bridge submissions and confirmations
//! - Failures by classified error kind
//! - Bridge pause state

use crate::error::{BridgeError, BridgeResult, ErrorKind};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    CounterVec, Encoder, Gauge, GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::{error, info};

lazy_static! {
    // Chain metrics
    pub static ref CHAIN_CONNECTED: GaugeVec = register_gauge_vec!(
        "nft_bridge_chain_connected",
        "Chain connection status (1=connected, 0=disconnected)",
        &["chain_id"]
    ).unwrap();

    pub static ref PENDING_CONFIRMATIONS: GaugeVec = register_gauge_vec!(
        "nft_bridge_pending_confirmations",
        "Transactions currently awaiting confirmation",
        &["chain_id"]
    ).unwrap();

    // Transfer metrics
    pub static ref APPROVALS_SUBMITTED: CounterVec = register_counter_vec!(
        "nft_bridge_approvals_submitted_total",
        "Total approval transactions submitted",
        &["chain_id", "token_type"]
    ).unwrap();

    pub static ref APPROVALS_CONFIRMED: CounterVec = register_counter_vec!(
        "nft_bridge_approvals_confirmed_total",
        "Total approval transactions confirmed",
        &["chain_id", "token_type"]
    ).unwrap();

    pub static ref BRIDGES_SUBMITTED: CounterVec = register_counter_vec!(
        "nft_bridge_bridges_submitted_total",
        "Total bridge transactions submitted",
        &["src_chain_id", "dest_chain_id", "token_type"]
    ).unwrap();

    pub static ref BRIDGES_CONFIRMED: CounterVec = register_counter_vec!(
        "nft_bridge_bridges_confirmed_total",
        "Total bridge transactions confirmed and recorded",
        &["src_chain_id", "dest_chain_id", "token_type"]
    ).unwrap();

    pub static ref FAILURES: CounterVec = register_counter_vec!(
        "nft_bridge_failures_total",
        "Total failed approve/bridge attempts by error kind",
        &["action", "kind"]
    ).unwrap();

    pub static ref CONFIRMATION_LATENCY: HistogramVec = register_histogram_vec!(
        "nft_bridge_confirmation_latency_seconds",
        "Time from submission to confirmation",
        &["chain_id", "direction"],
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
    ).unwrap();

    // Contract state metrics
    pub static ref BRIDGE_PAUSED: Gauge = register_gauge!(
        "nft_bridge_paused",
        "Bridge pause status at the last check (1=paused, 0=active)"
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: CounterVec = register_counter_vec!(
        "nft_bridge_health_check_success_total",
        "Total successful health checks",
        &[]
    ).unwrap();

    pub static ref HEALTH_CHECK_FAILURE: CounterVec = register_counter_vec!(
        "nft_bridge_health_check_failure_total",
        "Total failed health checks",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> BridgeResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| BridgeError::Internal(format!("Cannot bind metrics port: {}", e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| BridgeError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Text exposition of every registered metric
pub fn render() -> BridgeResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| BridgeError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_chain_health(chain_id: u64, healthy: bool) {
    CHAIN_CONNECTED
        .with_label_values(&[&chain_id.to_string()])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_pending_confirmations(chain_id: u64, pending: usize) {
    PENDING_CONFIRMATIONS
        .with_label_values(&[&chain_id.to_string()])
        .set(pending as f64);
}

pub fn record_approval_submitted(chain_id: u64, token_type: &str) {
    APPROVALS_SUBMITTED
        .with_label_values(&[&chain_id.to_string(), token_type])
        .inc();
}

pub fn record_approval_confirmed(chain_id: u64, token_type: &str) {
    APPROVALS_CONFIRMED
        .with_label_values(&[&chain_id.to_string(), token_type])
        .inc();
}

pub fn record_bridge_submitted(src_chain_id: u64, dest_chain_id: u64, token_type: &str) {
    BRIDGES_SUBMITTED
        .with_label_values(&[
            &src_chain_id.to_string(),
            &dest_chain_id.to_string(),
            token_type,
        ])
        .inc();
}

pub fn record_bridge_confirmed(src_chain_id: u64, dest_chain_id: u64, token_type: &str) {
    BRIDGES_CONFIRMED
        .with_label_values(&[
            &src_chain_id.to_string(),
            &dest_chain_id.to_string(),
            token_type,
        ])
        .inc();
}

pub fn record_failure(action: &str, kind: ErrorKind) {
    FAILURES.with_label_values(&[action, kind.as_str()]).inc();
}

pub fn record_confirmation_latency(chain_id: u64, direction: &str, latency_secs: f64) {
    CONFIRMATION_LATENCY
        .with_label_values(&[&chain_id.to_string(), direction])
        .observe(latency_secs);
}

pub fn record_pause_check(paused: bool) {
    BRIDGE_PAUSED.set(if paused { 1.0 } else { 0.0 });
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.with_label_values(&[]).inc();
}

pub fn record_health_check_failure() {
    HEALTH_CHECK_FAILURE.with_label_values(&[]).inc();
}
