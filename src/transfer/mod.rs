//! Transfer module - one user-initiated NFT bridge transfer
//!
//! This module provides:
//! - The token and transfer intent types
//! - The explicit approval -> bridge step machine
//! - Per-transfer context and the view snapshot derived from it
//! - The orchestrator driving approve, bridge, confirm and persist

pub mod context;
pub mod intent;
pub mod orchestrator;
pub mod step;

pub use context::{
    ApprovalRecord, BridgingStatus, StatusMessage, SubmittedTransaction, TransferContext,
    TxDirection, ViewState,
};
pub use intent::{Token, TokenType, TransferIntent};
pub use orchestrator::{CancelHandle, CancelSignal, Collaborators, TransferOrchestrator};
pub use step::{transition, StepTransition, TransferAction, TransferStep};
