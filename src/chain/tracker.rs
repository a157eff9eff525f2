//! Pending-transaction tracking until chain confirmation
//!
//! Confirmation depth differs per network:
//! - Ethereum mainnet: a couple of blocks on top of inclusion
//! - Polygon PoS: deeper, reorgs of a few dozen blocks happen
//! - Rollups (Arbitrum, Optimism, Base): inclusion by the sequencer is enough for the UI

use super::ChainReader;
use crate::error::{BridgeError, BridgeResult};

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::H256;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A transaction observed as confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedTransaction {
    pub tx_hash: H256,
    pub chain_id: u64,
    pub block_number: u64,
    pub confirmations: u64,
}

/// Observes a submitted hash until it is confirmed on its chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionTracker: Send + Sync {
    /// Resolves once the transaction is confirmed; suspends until then
    async fn wait_confirmed(
        &self,
        tx_hash: H256,
        chain_id: u64,
    ) -> BridgeResult<ConfirmedTransaction>;
}

/// What one receipt poll tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptState {
    NotIncluded,
    Pending { confirmations: u64 },
    Confirmed { block_number: u64, confirmations: u64 },
    Reverted { block_number: u64 },
}

/// Classify a receipt; inclusion itself counts as the first confirmation
pub fn assess_receipt(
    receipt_block: Option<u64>,
    receipt_status: Option<u64>,
    current_block: u64,
    required: u64,
) -> ReceiptState {
    let Some(block_number) = receipt_block else {
        return ReceiptState::NotIncluded;
    };

    if receipt_status == Some(0) {
        return ReceiptState::Reverted { block_number };
    }

    let confirmations = current_block.saturating_sub(block_number) + 1;
    if confirmations >= required.max(1) {
        ReceiptState::Confirmed {
            block_number,
            confirmations,
        }
    } else {
        ReceiptState::Pending { confirmations }
    }
}

/// Receipt-polling tracker backed by the configured chain providers
pub struct ReceiptTracker {
    reader: Arc<dyn ChainReader>,
    poll_interval: Duration,
    /// Hashes currently awaited: tx_hash -> chain_id
    pending: DashMap<H256, u64>,
}

impl ReceiptTracker {
    pub fn new(reader: Arc<dyn ChainReader>, poll_interval: Duration) -> Self {
        Self {
            reader,
            poll_interval,
            pending: DashMap::new(),
        }
    }

    /// Number of transactions currently awaited
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn pending_on(&self, chain_id: u64) -> usize {
        self.pending.iter().filter(|e| *e.value() == chain_id).count()
    }

    async fn poll(&self, tx_hash: H256, chain_id: u64) -> BridgeResult<ReceiptState> {
        let required = self.reader.required_confirmations(chain_id)?;

        let Some(receipt) = self.reader.receipt(chain_id, tx_hash).await? else {
            return Ok(ReceiptState::NotIncluded);
        };
        let current_block = self.reader.block_number(chain_id).await?;

        Ok(assess_receipt(
            receipt.block_number,
            receipt.status,
            current_block,
            required,
        ))
    }
}

/// Keeps a hash in the pending set until the wait ends or its future is dropped
struct PendingEntry<'a> {
    tracker: &'a ReceiptTracker,
    tx_hash: H256,
    chain_id: u64,
}

impl<'a> PendingEntry<'a> {
    fn track(tracker: &'a ReceiptTracker, tx_hash: H256, chain_id: u64) -> Self {
        tracker.pending.insert(tx_hash, chain_id);
        crate::metrics::record_pending_confirmations(chain_id, tracker.pending_on(chain_id));
        Self {
            tracker,
            tx_hash,
            chain_id,
        }
    }
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.tracker.pending.remove(&self.tx_hash);
        crate::metrics::record_pending_confirmations(
            self.chain_id,
            self.tracker.pending_on(self.chain_id),
        );
    }
}

#[async_trait]
impl TransactionTracker for ReceiptTracker {
    async fn wait_confirmed(
        &self,
        tx_hash: H256,
        chain_id: u64,
    ) -> BridgeResult<ConfirmedTransaction> {
        let _entry = PendingEntry::track(self, tx_hash, chain_id);
        debug!("Tracking tx {:?} for confirmation on chain {}", tx_hash, chain_id);

        loop {
            match self.poll(tx_hash, chain_id).await {
                Ok(ReceiptState::Confirmed {
                    block_number,
                    confirmations,
                }) => {
                    info!(
                        "Transaction {:?} confirmed on chain {} ({} confirmations)",
                        tx_hash, chain_id, confirmations
                    );
                    return Ok(ConfirmedTransaction {
                        tx_hash,
                        chain_id,
                        block_number,
                        confirmations,
                    });
                }
                Ok(ReceiptState::Reverted { block_number }) => {
                    warn!(
                        "Transaction {:?} reverted on chain {} in block {}",
                        tx_hash, chain_id, block_number
                    );
                    return Err(BridgeError::TransactionReverted {
                        chain_id,
                        tx_hash: format!("{:?}", tx_hash),
                    });
                }
                Ok(ReceiptState::Pending { confirmations }) => {
                    debug!(
                        "Transaction {:?} has {} confirmations on chain {}",
                        tx_hash, confirmations, chain_id
                    );
                }
                Ok(ReceiptState::NotIncluded) => {}
                // Unknown chains never become known; anything else is a flaky node
                Err(e @ BridgeError::ChainNotFound { .. }) => return Err(e),
                Err(e) => {
                    warn!("Receipt poll for {:?} failed: {}", tx_hash, e);
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Get recommended confirmation blocks for a chain
pub fn recommended_confirmations(chain_id: u64) -> u64 {
    match chain_id {
        // Ethereum mainnet
        1 => 2,
        // Polygon mainnet
        137 => 32,
        // Polygon testnets
        80001 | 80002 => 8,
        // Default: inclusion is enough
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChainReader, ReceiptSummary};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn tracker(reader: MockChainReader) -> ReceiptTracker {
        ReceiptTracker::new(Arc::new(reader), Duration::from_millis(5))
    }

    fn included(block_number: u64, status: u64) -> BridgeResult<Option<ReceiptSummary>> {
        Ok(Some(ReceiptSummary {
            block_number: Some(block_number),
            status: Some(status),
        }))
    }

    #[tokio::test]
    async fn test_waits_for_required_depth() {
        let head = Arc::new(AtomicU64::new(100));
        let mut reader = MockChainReader::new();
        reader.expect_required_confirmations().returning(|_| Ok(3));
        reader.expect_receipt().returning(|_, _| included(100, 1));
        let polled = head.clone();
        reader
            .expect_block_number()
            .returning(move |_| Ok(polled.fetch_add(1, Ordering::SeqCst)));
        let tracker = tracker(reader);

        let hash = H256::repeat_byte(1);
        let confirmed = tracker.wait_confirmed(hash, 1).await.unwrap();

        assert_eq!(confirmed.block_number, 100);
        assert_eq!(confirmed.confirmations, 3);
        assert_eq!(head.load(Ordering::SeqCst), 103);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reverted_receipt_ends_the_wait() {
        let mut reader = MockChainReader::new();
        reader.expect_required_confirmations().returning(|_| Ok(1));
        reader.expect_receipt().returning(|_, _| included(7, 0));
        reader.expect_block_number().returning(|_| Ok(9));
        let tracker = tracker(reader);

        let err = tracker
            .wait_confirmed(H256::repeat_byte(2), 10)
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::TransactionReverted { chain_id: 10, .. }));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_node_errors_are_retried() {
        let calls = Arc::new(AtomicU64::new(0));
        let mut reader = MockChainReader::new();
        reader.expect_required_confirmations().returning(|_| Ok(1));
        let seen = calls.clone();
        reader.expect_receipt().returning(move |chain_id, _| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BridgeError::ChainConnection {
                    chain_id,
                    message: "connection refused".to_string(),
                })
            } else {
                included(50, 1)
            }
        });
        reader.expect_block_number().returning(|_| Ok(50));
        let tracker = tracker(reader);

        tracker.wait_confirmed(H256::repeat_byte(3), 1).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_chain_is_not_retried() {
        let mut reader = MockChainReader::new();
        reader
            .expect_required_confirmations()
            .times(1)
            .returning(|chain_id| Err(BridgeError::ChainNotFound { chain_id }));
        reader.expect_receipt().never();
        let tracker = tracker(reader);

        let err = tracker.wait_confirmed(H256::repeat_byte(4), 5).await.unwrap_err();
        assert!(matches!(err, BridgeError::ChainNotFound { chain_id: 5 }));
    }

    #[tokio::test]
    async fn test_dropped_wait_releases_pending_entry() {
        let mut reader = MockChainReader::new();
        reader.expect_required_confirmations().returning(|_| Ok(1));
        reader.expect_receipt().returning(|_, _| Ok(None));
        let tracker = tracker(reader);

        let hash = H256::repeat_byte(5);
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            tracker.wait_confirmed(hash, 1),
        )
        .await;

        assert!(waited.is_err());
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_while_waiting() {
        let mut reader = MockChainReader::new();
        reader.expect_required_confirmations().returning(|_| Ok(1));
        reader.expect_receipt().returning(|_, _| Ok(None));
        let tracker = tracker(reader);

        let mut wait = tokio_test::task::spawn(tracker.wait_confirmed(H256::repeat_byte(6), 1));
        tokio_test::assert_pending!(wait.poll());
        assert_eq!(tracker.pending_count(), 1);
        drop(wait);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_missing_block_means_not_included() {
        assert_eq!(assess_receipt(None, None, 100, 1), ReceiptState::NotIncluded);
    }

    #[test]
    fn test_inclusion_counts_as_first_confirmation() {
        assert_eq!(
            assess_receipt(Some(100), Some(1), 100, 1),
            ReceiptState::Confirmed {
                block_number: 100,
                confirmations: 1
            }
        );
        assert_eq!(
            assess_receipt(Some(100), Some(1), 100, 2),
            ReceiptState::Pending { confirmations: 1 }
        );
        assert_eq!(
            assess_receipt(Some(100), Some(1), 101, 2),
            ReceiptState::Confirmed {
                block_number: 100,
                confirmations: 2
            }
        );
    }

    #[test]
    fn test_failed_status_is_reverted() {
        assert_eq!(
            assess_receipt(Some(7), Some(0), 50, 1),
            ReceiptState::Reverted { block_number: 7 }
        );
    }

    #[test]
    fn test_zero_requirement_still_needs_inclusion() {
        assert_eq!(assess_receipt(None, Some(1), 10, 0), ReceiptState::NotIncluded);
        assert!(matches!(
            assess_receipt(Some(10), Some(1), 10, 0),
            ReceiptState::Confirmed { .. }
        ));
    }

    #[test]
    fn test_recommended_confirmations() {
        assert_eq!(recommended_confirmations(1), 2);
        assert_eq!(recommended_confirmations(137), 32);
        assert_eq!(recommended_confirmations(10), 1);
    }
}
