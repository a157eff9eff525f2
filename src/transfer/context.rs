//! Explicit per-transfer state owned by the orchestrator

use super::intent::TransferIntent;
use super::step::{transition, StepTransition, TransferAction, TransferStep};
use crate::error::{BridgeError, BridgeResult};

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgingStatus {
    Pending,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxDirection {
    Approve,
    Bridge,
}

/// A transaction whose confirmation is being awaited
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedTransaction {
    pub hash: H256,
    pub direction: TxDirection,
    pub chain_id: u64,
    pub submitted_at: DateTime<Utc>,
}

/// Last known on-chain approval for a (token, chain, spender, owner) tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalRecord {
    pub token_address: Address,
    pub chain_id: u64,
    pub spender: Address,
    pub owner: Address,
    pub approved: bool,
    pub checked_at: DateTime<Utc>,
}

/// Status text for the view layer, as i18n keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub title_key: &'static str,
    pub description_key: &'static str,
    pub explorer_url: Option<String>,
}

/// Snapshot consumed by the view layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub step: TransferStep,
    pub bridging_status: BridgingStatus,
    pub approving: bool,
    pub bridging: bool,
    pub all_approved: bool,
    pub status: Option<StatusMessage>,
}

#[derive(Debug, Clone)]
pub struct TransferContext {
    intent: TransferIntent,
    step: TransferStep,
    approvals: Vec<ApprovalRecord>,
    submitted: Option<SubmittedTransaction>,
    status: Option<StatusMessage>,
    history: Vec<StepTransition>,
}

impl TransferContext {
    pub fn new(intent: TransferIntent) -> Self {
        Self {
            intent,
            step: TransferStep::AwaitingApproval,
            approvals: Vec::new(),
            submitted: None,
            status: None,
            history: Vec::new(),
        }
    }

    pub fn intent(&self) -> &TransferIntent {
        &self.intent
    }

    /// Edit the intent; rejected while approving and once bridging has started
    pub fn update_intent<F>(&mut self, edit: F) -> BridgeResult<()>
    where
        F: FnOnce(&mut TransferIntent),
    {
        if self.step.is_locked() || self.step == TransferStep::Approving {
            return Err(BridgeError::IntentLocked);
        }
        edit(&mut self.intent);
        // A different token, chain or owner invalidates what we knew
        self.approvals.clear();
        if self.step == TransferStep::AwaitingBridge {
            self.apply(TransferAction::IntentChanged)?;
        }
        Ok(())
    }

    pub fn step(&self) -> TransferStep {
        self.step
    }

    pub fn bridging_status(&self) -> BridgingStatus {
        if self.step == TransferStep::Done {
            BridgingStatus::Done
        } else {
            BridgingStatus::Pending
        }
    }

    /// True when at least one approval was checked and none is missing
    pub fn all_approved(&self) -> bool {
        !self.approvals.is_empty() && self.approvals.iter().all(|a| a.approved)
    }

    pub fn approvals(&self) -> &[ApprovalRecord] {
        &self.approvals
    }

    pub fn submitted(&self) -> Option<&SubmittedTransaction> {
        self.submitted.as_ref()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn transitions(&self) -> &[StepTransition] {
        &self.history
    }

    pub fn view(&self) -> ViewState {
        ViewState {
            step: self.step,
            bridging_status: self.bridging_status(),
            approving: self.step == TransferStep::Approving,
            bridging: matches!(self.step, TransferStep::Bridging | TransferStep::Confirming),
            all_approved: self.all_approved(),
            status: self.status.clone(),
        }
    }

    pub(crate) fn apply(&mut self, action: TransferAction) -> BridgeResult<StepTransition> {
        let (next, record) = transition(self.step, action)?;
        self.step = next;
        self.history.push(record.clone());
        Ok(record)
    }

    /// Replace the record for the same (token, chain, spender, owner)
    pub(crate) fn record_approval(&mut self, record: ApprovalRecord) {
        self.approvals.retain(|existing| {
            !(existing.token_address == record.token_address
                && existing.chain_id == record.chain_id
                && existing.spender == record.spender
                && existing.owner == record.owner)
        });
        self.approvals.push(record);
    }

    pub(crate) fn set_submitted(&mut self, submitted: Option<SubmittedTransaction>) {
        self.submitted = submitted;
    }

    pub(crate) fn set_status(&mut self, status: StatusMessage) {
        self.status = Some(status);
    }
}
