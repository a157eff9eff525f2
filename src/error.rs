//! Error types for the bridge orchestrator

use serde::Serialize;
use thiserror::Error;

/// Main error type for approval and bridge orchestration
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge is paused")]
    BridgePaused,

    #[error("Token address not found on chain {chain_id} for {symbol}")]
    AddressNotFound { chain_id: u64, symbol: String },

    #[error("No token ids selected for bridging")]
    TokenIdsNotFound,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },

    #[error("Chain {chain_id} not found")]
    ChainNotFound { chain_id: u64 },

    #[error("No route configured from chain {src_chain_id} to chain {dest_chain_id}")]
    RouteNotFound {
        src_chain_id: u64,
        dest_chain_id: u64,
    },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction {tx_hash} reverted on chain {chain_id}")]
    TransactionReverted { chain_id: u64, tx_hash: String },

    #[error("Invalid state transition from {from} on {action}")]
    InvalidStateTransition { from: String, action: String },

    #[error("Transfer intent is locked once bridging has started")]
    IntentLocked,

    #[error("Missing context for bridge confirmation: {missing}")]
    MissingContext { missing: String },

    #[error("Confirmation wait for {tx_hash} was cancelled")]
    Cancelled { tx_hash: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used to pick the user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Paused,
    AddressNotFound,
    TokenIdsNotFound,
    UserRejected,
    InsufficientFunds,
    Reverted,
    Network,
    InvalidState,
    Cancelled,
    Unknown,
}

impl ErrorKind {
    /// i18n key of the notification shown for this kind of failure
    pub fn message_key(&self) -> &'static str {
        match self {
            ErrorKind::Paused => "bridge.errors.paused",
            ErrorKind::AddressNotFound => "bridge.errors.address_not_found",
            ErrorKind::TokenIdsNotFound => "bridge.errors.token_ids_not_found",
            ErrorKind::UserRejected => "bridge.errors.rejected",
            ErrorKind::InsufficientFunds => "bridge.errors.insufficient_funds",
            ErrorKind::Reverted => "bridge.errors.reverted",
            ErrorKind::Network => "bridge.errors.network",
            ErrorKind::InvalidState => "bridge.errors.invalid_state",
            ErrorKind::Cancelled => "bridge.errors.cancelled",
            ErrorKind::Unknown => "bridge.errors.unknown",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Paused => "paused",
            ErrorKind::AddressNotFound => "address_not_found",
            ErrorKind::TokenIdsNotFound => "token_ids_not_found",
            ErrorKind::UserRejected => "user_rejected",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Reverted => "reverted",
            ErrorKind::Network => "network",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl BridgeError {
    /// Classify the error for user-facing notification
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::BridgePaused => ErrorKind::Paused,
            BridgeError::AddressNotFound { .. } => ErrorKind::AddressNotFound,
            BridgeError::TokenIdsNotFound => ErrorKind::TokenIdsNotFound,
            BridgeError::TransactionReverted { .. } => ErrorKind::Reverted,
            BridgeError::ChainConnection { .. } => ErrorKind::Network,
            BridgeError::InvalidStateTransition { .. } | BridgeError::IntentLocked => {
                ErrorKind::InvalidState
            }
            BridgeError::Cancelled { .. } => ErrorKind::Cancelled,
            BridgeError::Wallet(message)
            | BridgeError::Transaction(message)
            | BridgeError::Contract(message) => classify_upstream(message),
            _ => ErrorKind::Unknown,
        }
    }

    /// Check if error is retryable by repeating the user action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::UserRejected | ErrorKind::Cancelled
        )
    }

    /// Check if error should trigger an alert
    pub fn should_alert(&self) -> bool {
        matches!(
            self,
            BridgeError::MissingContext { .. }
                | BridgeError::Database(_)
                | BridgeError::Internal(_)
        )
    }
}

/// Upstream wallets and nodes only give us free-form messages
fn classify_upstream(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    if message.contains("user rejected") || message.contains("user denied") {
        ErrorKind::UserRejected
    } else if message.contains("insufficient funds") {
        ErrorKind::InsufficientFunds
    } else if message.contains("revert") {
        ErrorKind::Reverted
    } else if message.contains("timeout") || message.contains("connection") {
        ErrorKind::Network
    } else {
        ErrorKind::Unknown
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_classify_directly() {
        assert_eq!(BridgeError::BridgePaused.kind(), ErrorKind::Paused);
        assert_eq!(BridgeError::TokenIdsNotFound.kind(), ErrorKind::TokenIdsNotFound);
        assert_eq!(
            BridgeError::AddressNotFound {
                chain_id: 1,
                symbol: "BAYC".to_string()
            }
            .kind(),
            ErrorKind::AddressNotFound
        );
    }

    #[test]
    fn test_upstream_messages_are_classified() {
        let rejected = BridgeError::Wallet("User rejected the request.".to_string());
        assert_eq!(rejected.kind(), ErrorKind::UserRejected);
        assert!(rejected.is_retryable());

        let funds = BridgeError::Transaction("insufficient funds for gas * price".to_string());
        assert_eq!(funds.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(funds.kind().message_key(), "bridge.errors.insufficient_funds");

        let other = BridgeError::Contract("something odd".to_string());
        assert_eq!(other.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_missing_context_alerts() {
        let err = BridgeError::MissingContext {
            missing: "chain 5 in registry".to_string(),
        };
        assert!(err.should_alert());
        assert!(!BridgeError::BridgePaused.should_alert());
    }
}
