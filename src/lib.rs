//! NFT Bridge Orchestrator - approval and bridge sequencing for cross-chain NFT transfers
//!
//! A transfer goes through approve -> bridge -> confirm -> persist. The
//! orchestrator in [`transfer`] drives that sequence against collaborator
//! traits; [`chain`], [`bridge`] and [`state`] provide their implementations.

pub mod api;
pub mod bridge;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod state;
pub mod transfer;

pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use events::BridgeEvent;
pub use transfer::{TransferIntent, TransferOrchestrator};
