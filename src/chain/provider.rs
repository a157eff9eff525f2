//! Chain provider with multi-RPC support and automatic failover

use crate::config::ChainConfig;
use crate::error::{BridgeError, BridgeResult};

use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    /// Chain configuration
    config: ChainConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
    /// Last known block number
    last_block: RwLock<u64>,
}

impl ChainProvider {
    /// Create a new chain provider; no request is made until first use
    pub fn new(config: ChainConfig) -> BridgeResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(BridgeError::ChainConnection {
                chain_id: config.chain_id,
                message: "No valid RPC providers".to_string(),
            });
        }

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
            last_block: RwLock::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.config.chain_id, next);
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Last block number observed by `get_block_number`
    pub async fn last_block(&self) -> u64 {
        *self.last_block.read().await
    }

    /// Get current block number with failover
    pub async fn get_block_number(&self) -> BridgeResult<u64> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_block_number().await {
                Ok(block) => {
                    let block_num = block.as_u64();
                    *self.last_block.write().await = block_num;
                    return Ok(block_num);
                }
                Err(e) => {
                    warn!(
                        "Failed to get block number from chain {}: {}",
                        self.config.chain_id, e
                    );
                    self.failover();
                }
            }
        }

        Err(BridgeError::ChainConnection {
            chain_id: self.config.chain_id,
            message: "All providers failed".to_string(),
        })
    }

    /// Get transaction receipt
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> BridgeResult<Option<TransactionReceipt>> {
        self.http()
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| BridgeError::ChainConnection {
                chain_id: self.config.chain_id,
                message: e.to_string(),
            })
    }

    /// Read-only contract call with failover
    pub async fn call(&self, to: Address, data: Bytes) -> BridgeResult<Bytes> {
        debug!(
            "eth_call {:?} on chain {} selector 0x{}",
            to,
            self.config.chain_id,
            hex::encode(&data[..data.len().min(4)])
        );
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();

        for _ in 0..self.http_providers.len() {
            match self.http().call(&tx, None).await {
                Ok(output) => return Ok(output),
                Err(e) => {
                    let message = e.to_string();
                    // A revert is the contract's answer, not a node failure
                    if message.contains("revert") {
                        return Err(BridgeError::Contract(format!(
                            "call to {:?} on chain {} reverted: {}",
                            to, self.config.chain_id, message
                        )));
                    }
                    warn!(
                        "Call to {:?} failed on chain {}: {}",
                        to, self.config.chain_id, message
                    );
                    self.failover();
                }
            }
        }

        Err(BridgeError::ChainConnection {
            chain_id: self.config.chain_id,
            message: "All providers failed to answer eth_call".to_string(),
        })
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        self.get_block_number().await.is_ok()
    }
}
