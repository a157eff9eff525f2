//! Notification events emitted by the orchestrator
//!
//! The view layer subscribes to these and turns them into toasts and status
//! text; every user-facing string is an i18n key, never rendered text.

use crate::error::ErrorKind;
use crate::transfer::StepTransition;

use ethers::types::{Address, H256};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The transfer moved to another step
    StepChanged {
        transfer_id: Uuid,
        transition: StepTransition,
    },

    /// Approval transaction sent, awaiting confirmation
    ApprovalSubmitted {
        transfer_id: Uuid,
        tx_hash: H256,
        chain_id: u64,
        explorer_url: Option<String>,
    },

    /// Approval confirmed and approval status re-read
    ApprovalConfirmed {
        transfer_id: Uuid,
        tx_hash: H256,
        chain_id: u64,
        all_approved: bool,
    },

    /// Bridge transaction sent, awaiting confirmation
    BridgeSubmitted {
        transfer_id: Uuid,
        tx_hash: H256,
        chain_id: u64,
        explorer_url: String,
    },

    /// Bridge transaction confirmed on the source chain
    BridgeConfirmed {
        transfer_id: Uuid,
        tx_hash: H256,
        chain_id: u64,
    },

    /// Confirmed bridge transaction added to the sender's history
    TransactionRecorded {
        transfer_id: Uuid,
        tx_hash: H256,
        sender: Address,
    },

    /// An approve or bridge attempt failed
    Failed {
        transfer_id: Uuid,
        kind: ErrorKind,
        message_key: &'static str,
        detail: String,
    },
}

impl BridgeEvent {
    pub fn transfer_id(&self) -> Uuid {
        match self {
            BridgeEvent::StepChanged { transfer_id, .. } => *transfer_id,
            BridgeEvent::ApprovalSubmitted { transfer_id, .. } => *transfer_id,
            BridgeEvent::ApprovalConfirmed { transfer_id, .. } => *transfer_id,
            BridgeEvent::BridgeSubmitted { transfer_id, .. } => *transfer_id,
            BridgeEvent::BridgeConfirmed { transfer_id, .. } => *transfer_id,
            BridgeEvent::TransactionRecorded { transfer_id, .. } => *transfer_id,
            BridgeEvent::Failed { transfer_id, .. } => *transfer_id,
        }
    }

    /// Get event name for metrics and logs
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::StepChanged { .. } => "step_changed",
            BridgeEvent::ApprovalSubmitted { .. } => "approval_submitted",
            BridgeEvent::ApprovalConfirmed { .. } => "approval_confirmed",
            BridgeEvent::BridgeSubmitted { .. } => "bridge_submitted",
            BridgeEvent::BridgeConfirmed { .. } => "bridge_confirmed",
            BridgeEvent::TransactionRecorded { .. } => "transaction_recorded",
            BridgeEvent::Failed { .. } => "failed",
        }
    }

    /// Notification shown for the event, if any
    pub fn notification(&self) -> Option<(NotificationLevel, &'static str)> {
        match self {
            BridgeEvent::StepChanged { .. } | BridgeEvent::TransactionRecorded { .. } => None,
            BridgeEvent::ApprovalSubmitted { .. } => {
                Some((NotificationLevel::Info, "bridge.actions.approve.tx"))
            }
            BridgeEvent::ApprovalConfirmed { .. } => {
                Some((NotificationLevel::Success, "bridge.actions.approve.success"))
            }
            BridgeEvent::BridgeSubmitted { .. } => {
                Some((NotificationLevel::Info, "bridge.actions.bridge.tx"))
            }
            BridgeEvent::BridgeConfirmed { .. } => {
                Some((NotificationLevel::Success, "bridge.actions.bridge.success"))
            }
            BridgeEvent::Failed { message_key, .. } => {
                Some((NotificationLevel::Error, *message_key))
            }
        }
    }
}
