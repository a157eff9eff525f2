//! Bridge transaction history
//!
//! Handles:
//! - The persisted record of each confirmed bridge transaction
//! - Append-only storage keyed by sender address
//! - Lookups for later status polling

mod memory;
mod postgres;

pub use memory::MemoryTransactionStore;
pub use postgres::PgTransactionStore;

use crate::error::BridgeResult;
use crate::transfer::TokenType;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a bridge message; this crate only ever writes `New`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    New,
    Retriable,
    Done,
    Failed,
    Recalled,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::New => "new",
            MessageStatus::Retriable => "retriable",
            MessageStatus::Done => "done",
            MessageStatus::Failed => "failed",
            MessageStatus::Recalled => "recalled",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(MessageStatus::New),
            "retriable" => Ok(MessageStatus::Retriable),
            "done" => Ok(MessageStatus::Done),
            "failed" => Ok(MessageStatus::Failed),
            "recalled" => Ok(MessageStatus::Recalled),
            other => Err(format!("unknown message status: {}", other)),
        }
    }
}

/// A confirmed bridge transaction as kept in the sender's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeTransaction {
    pub hash: H256,
    pub from: Address,
    pub amount: U256,
    pub symbol: String,
    pub decimals: u8,
    pub src_chain_id: u64,
    pub dest_chain_id: u64,
    pub token_type: TokenType,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// Append-only transaction history, keyed by sender address
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn add_tx_by_address(&self, address: Address, tx: BridgeTransaction)
        -> BridgeResult<()>;

    /// History of `address`, oldest first
    async fn get_txs_by_address(&self, address: Address) -> BridgeResult<Vec<BridgeTransaction>>;

    async fn health_check(&self) -> BridgeResult<()>;
}
