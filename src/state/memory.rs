//! In-process transaction history

use super::{BridgeTransaction, TransactionStore};
use crate::error::BridgeResult;

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::Address;
use tracing::debug;

/// History held in memory; lost on restart
#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    by_address: DashMap<Address, Vec<BridgeTransaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored transactions across all addresses
    pub fn len(&self) -> usize {
        self.by_address.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn add_tx_by_address(
        &self,
        address: Address,
        tx: BridgeTransaction,
    ) -> BridgeResult<()> {
        let mut txs = self.by_address.entry(address).or_default();
        if txs.iter().any(|existing| existing.hash == tx.hash) {
            debug!("Transaction {:?} already recorded for {:?}", tx.hash, address);
            return Ok(());
        }
        txs.push(tx);
        Ok(())
    }

    async fn get_txs_by_address(&self, address: Address) -> BridgeResult<Vec<BridgeTransaction>> {
        Ok(self
            .by_address
            .get(&address)
            .map(|txs| txs.clone())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> BridgeResult<()> {
        Ok(())
    }
}
