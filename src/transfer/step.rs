//! Approval -> bridge step machine

use crate::error::{BridgeError, BridgeResult};

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStep {
    AwaitingApproval,
    Approving,
    AwaitingBridge,
    Bridging,
    Confirming,
    Done,
}

impl TransferStep {
    /// Steps from which the transfer intent may no longer change
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            TransferStep::Bridging | TransferStep::Confirming | TransferStep::Done
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == TransferStep::Done
    }
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStep::AwaitingApproval => "awaiting_approval",
            TransferStep::Approving => "approving",
            TransferStep::AwaitingBridge => "awaiting_bridge",
            TransferStep::Bridging => "bridging",
            TransferStep::Confirming => "confirming",
            TransferStep::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    /// Approval checker reports every token approved
    AllApproved,
    StartApproval,
    ApprovalConfirmed,
    /// Approval landed but the checker still reports missing approvals
    ApprovalIncomplete,
    /// Intent edited after approval; approvals must be checked again
    IntentChanged,
    StartBridge,
    Submitted,
    Confirmed,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTransition {
    pub from: TransferStep,
    pub to: TransferStep,
    pub reason: &'static str,
}

pub fn transition(
    step: TransferStep,
    action: TransferAction,
) -> BridgeResult<(TransferStep, StepTransition)> {
    use TransferAction as A;
    use TransferStep as S;

    let (to, reason) = match (step, action) {
        (S::AwaitingApproval, A::AllApproved) => (S::AwaitingBridge, "already_approved"),
        (S::AwaitingApproval, A::StartApproval) => (S::Approving, "approval_started"),
        (S::Approving, A::ApprovalConfirmed) => (S::AwaitingBridge, "approval_confirmed"),
        (S::Approving, A::ApprovalIncomplete) => (S::AwaitingApproval, "approval_incomplete"),
        (S::Approving, A::Fail) => (S::AwaitingApproval, "approval_failed"),
        (S::AwaitingBridge, A::IntentChanged) => (S::AwaitingApproval, "intent_changed"),
        (S::AwaitingBridge, A::StartBridge) => (S::Bridging, "bridge_started"),
        (S::Bridging, A::Submitted) => (S::Confirming, "bridge_submitted"),
        (S::Bridging, A::Fail) => (S::AwaitingBridge, "bridge_failed"),
        (S::Confirming, A::Confirmed) => (S::Done, "bridge_confirmed"),
        (S::Confirming, A::Fail) => (S::AwaitingBridge, "confirmation_failed"),
        _ => {
            return Err(BridgeError::InvalidStateTransition {
                from: step.to_string(),
                action: format!("{:?}", action),
            })
        }
    };

    Ok((
        to,
        StepTransition {
            from: step,
            to,
            reason,
        },
    ))
}
