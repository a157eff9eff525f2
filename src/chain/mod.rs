//! Chain module - chain connections, contract registry and confirmation tracking
//!
//! This module provides:
//! - Multi-RPC provider management with automatic failover
//! - The network-pair -> vault contract registry
//! - Receipt polling until chain confirmation
//! - Vault/token contract queries (pause state, approvals, bridged addresses)

pub mod provider;
pub mod tracker;
pub mod vault;

pub use provider::ChainProvider;
pub use tracker::{ConfirmedTransaction, ReceiptTracker, TransactionTracker};
pub use vault::{
    AddressResolver, ApprovalChecker, ApprovalQuery, PauseOracle, VaultAddressResolver,
    VaultApprovalChecker, VaultPauseOracle,
};

use crate::config::{ChainConfig, RouteConfig, Settings};
use crate::error::{BridgeError, BridgeResult};
use crate::transfer::TokenType;

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::{Address, Bytes, H256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Receipt fields needed to judge confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub block_number: Option<u64>,
    pub status: Option<u64>,
}

/// Read-only chain access shared by the vault queries and the receipt tracker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against a contract
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> BridgeResult<Bytes>;

    async fn receipt(&self, chain_id: u64, tx_hash: H256) -> BridgeResult<Option<ReceiptSummary>>;

    async fn block_number(&self, chain_id: u64) -> BridgeResult<u64>;

    /// Blocks on top of inclusion required before a transaction counts as confirmed
    fn required_confirmations(&self, chain_id: u64) -> BridgeResult<u64>;
}

/// Manages connections to all configured chains
pub struct ChainManager {
    /// Chain providers indexed by chain ID
    providers: DashMap<u64, Arc<ChainProvider>>,
}

impl ChainManager {
    /// Create a new chain manager with all enabled chains
    pub fn new(settings: &Settings) -> BridgeResult<Self> {
        let providers = DashMap::new();

        for (name, chain_config) in settings.enabled_chains() {
            info!(
                "Initializing chain {} (ID: {})",
                name, chain_config.chain_id
            );

            let provider = ChainProvider::new(chain_config.clone())?;
            providers.insert(chain_config.chain_id, Arc::new(provider));
        }

        Ok(Self { providers })
    }

    /// Get provider for a specific chain
    pub fn get_provider(&self, chain_id: u64) -> BridgeResult<Arc<ChainProvider>> {
        self.providers
            .get(&chain_id)
            .map(|p| p.clone())
            .ok_or(BridgeError::ChainNotFound { chain_id })
    }

    /// Health check for all chains
    pub async fn health_check(&self) -> Vec<(u64, bool)> {
        let mut results = Vec::new();

        let providers: Vec<_> = self.providers.iter().map(|e| e.value().clone()).collect();
        for provider in providers {
            let chain_id = provider.chain_id();
            let healthy = provider.health_check().await;
            if !healthy {
                warn!("Chain {} health check failed", chain_id);
            }
            results.push((chain_id, healthy));

            crate::metrics::record_chain_health(chain_id, healthy);
        }

        results
    }

    /// Get all connected chain IDs
    pub fn connected_chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.providers.iter().map(|e| *e.key()).collect();
        chains.sort_unstable();
        chains
    }
}

#[async_trait]
impl ChainReader for ChainManager {
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> BridgeResult<Bytes> {
        self.get_provider(chain_id)?.call(to, data).await
    }

    async fn receipt(&self, chain_id: u64, tx_hash: H256) -> BridgeResult<Option<ReceiptSummary>> {
        let receipt = self
            .get_provider(chain_id)?
            .get_transaction_receipt(tx_hash)
            .await?;
        Ok(receipt.map(|r| ReceiptSummary {
            block_number: r.block_number.map(|b| b.as_u64()),
            status: r.status.map(|s| s.as_u64()),
        }))
    }

    async fn block_number(&self, chain_id: u64) -> BridgeResult<u64> {
        self.get_provider(chain_id)?.get_block_number().await
    }

    fn required_confirmations(&self, chain_id: u64) -> BridgeResult<u64> {
        Ok(self.get_provider(chain_id)?.config().confirmations())
    }
}

/// Static lookup of chains and the vault contracts of each route
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainConfig>,
    routes: HashMap<(u64, u64), RouteConfig>,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainConfig>, routes: Vec<RouteConfig>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.chain_id, c)).collect(),
            routes: routes
                .into_iter()
                .map(|r| ((r.src_chain_id, r.dest_chain_id), r))
                .collect(),
        }
    }

    /// Enabled chains and the routes between them
    pub fn from_settings(settings: &Settings) -> Self {
        let chains: Vec<ChainConfig> = settings
            .enabled_chains()
            .into_iter()
            .map(|(_, chain)| chain.clone())
            .collect();
        let enabled = |chain_id: u64| chains.iter().any(|c| c.chain_id == chain_id);
        let routes = settings
            .routes
            .iter()
            .filter(|r| enabled(r.src_chain_id) && enabled(r.dest_chain_id))
            .cloned()
            .collect();
        Self::new(chains, routes)
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }

    pub fn route(&self, src_chain_id: u64, dest_chain_id: u64) -> BridgeResult<&RouteConfig> {
        self.routes
            .get(&(src_chain_id, dest_chain_id))
            .ok_or(BridgeError::RouteNotFound {
                src_chain_id,
                dest_chain_id,
            })
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteConfig> {
        self.routes.values()
    }

    /// Vault that acts as spender and custodian for the token standard
    pub fn vault_for(
        &self,
        src_chain_id: u64,
        dest_chain_id: u64,
        token_type: TokenType,
    ) -> BridgeResult<Address> {
        let route = self.route(src_chain_id, dest_chain_id)?;
        Ok(match token_type {
            TokenType::Erc721 => route.erc721_vault_address,
            TokenType::Erc1155 => route.erc1155_vault_address,
        })
    }

    /// Explorer link for a transaction, if the chain is known
    pub fn explorer_tx_url(&self, chain_id: u64, tx_hash: H256) -> Option<String> {
        self.chains
            .get(&chain_id)
            .map(|chain| explorer_tx_url(&chain.explorer_url, tx_hash))
    }
}

/// Explorer link for a transaction under an explorer base URL
pub fn explorer_tx_url(explorer_url: &str, tx_hash: H256) -> String {
    format!("{}/tx/{:?}", explorer_url.trim_end_matches('/'), tx_hash)
}
