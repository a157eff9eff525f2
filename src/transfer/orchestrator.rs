//! Transfer confirmation orchestrator
//!
//! Drives one transfer through approve -> bridge -> confirm -> persist:
//! - checks pause state and approval status before asking for an approval
//! - resolves the token address on the source chain
//! - submits through the bridge service bound to the token standard
//! - waits for confirmation and records the transaction in the sender's history
//!
//! Every failure of `approve`/`bridge` is logged, classified, broadcast as a
//! `BridgeEvent::Failed` and returned to the caller. Missing inputs are not
//! failures: the call does nothing and returns `Ok(None)`.

use super::context::{
    ApprovalRecord, StatusMessage, SubmittedTransaction, TransferContext, TxDirection, ViewState,
};
use super::intent::{Token, TransferIntent};
use super::step::{transition, TransferAction, TransferStep};
use crate::bridge::{
    ApproveArgs, BridgeArgsBuilder, BridgeServices, CommonBridgeArgs, NftBridge,
    StandardArgsBuilder, WalletProvider,
};
use crate::chain::{
    explorer_tx_url, AddressResolver, ApprovalChecker, ApprovalQuery, ChainReader, ChainRegistry,
    ConfirmedTransaction, PauseOracle, ReceiptTracker, TransactionTracker, VaultAddressResolver,
    VaultApprovalChecker, VaultPauseOracle,
};
use crate::error::{BridgeError, BridgeResult};
use crate::events::BridgeEvent;
use crate::metrics;
use crate::state::{BridgeTransaction, MessageStatus, TransactionStore};

use chrono::Utc;
use ethers::types::{Address, H256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

const STATUS_PENDING_TITLE: &str = "bridge.status.pending.title";
const STATUS_PENDING_DESCRIPTION: &str = "bridge.status.pending.description";
const STATUS_DONE_TITLE: &str = "bridge.status.done.title";
const STATUS_DONE_DESCRIPTION: &str = "bridge.status.done.description";

/// Everything the orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<ChainRegistry>,
    pub resolver: Arc<dyn AddressResolver>,
    pub approvals: Arc<dyn ApprovalChecker>,
    pub bridges: BridgeServices,
    pub args_builder: Arc<dyn BridgeArgsBuilder>,
    pub tracker: Arc<dyn TransactionTracker>,
    pub store: Arc<dyn TransactionStore>,
    pub pause_oracle: Arc<dyn PauseOracle>,
    pub wallets: Arc<dyn WalletProvider>,
}

impl Collaborators {
    /// Vault-backed collaborators over live chain connections
    pub fn on_chain(
        reader: Arc<dyn ChainReader>,
        registry: Arc<ChainRegistry>,
        bridges: BridgeServices,
        store: Arc<dyn TransactionStore>,
        wallets: Arc<dyn WalletProvider>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            resolver: Arc::new(VaultAddressResolver::new(reader.clone(), registry.clone())),
            approvals: Arc::new(VaultApprovalChecker::new(reader.clone())),
            args_builder: Arc::new(StandardArgsBuilder::new(registry.clone())),
            tracker: Arc::new(ReceiptTracker::new(reader.clone(), poll_interval)),
            pause_oracle: Arc::new(VaultPauseOracle::new(reader, registry.clone())),
            registry,
            bridges,
            store,
            wallets,
        }
    }
}

/// Cancels confirmation waits of the orchestrators holding the paired signal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is gone
    pub async fn cancelled(&mut self) {
        loop {
            let cancelled = *self.rx.borrow_and_update();
            if cancelled {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Inputs that must be present before anything is submitted
struct Ready {
    service: Arc<dyn NftBridge>,
    token: Token,
    src_chain_id: u64,
    dest_chain_id: u64,
    sender: Address,
}

pub struct TransferOrchestrator {
    id: Uuid,
    deps: Collaborators,
    context: TransferContext,
    events: broadcast::Sender<BridgeEvent>,
    cancel: CancelSignal,
}

impl TransferOrchestrator {
    pub fn new(deps: Collaborators, intent: TransferIntent) -> Self {
        Self::with_event_capacity(deps, intent, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(
        deps: Collaborators,
        intent: TransferIntent,
        capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let id = Uuid::new_v4();
        debug!("Transfer {} created", id);
        Self {
            id,
            deps,
            context: TransferContext::new(intent),
            events,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    pub fn context(&self) -> &TransferContext {
        &self.context
    }

    pub fn view(&self) -> ViewState {
        self.context.view()
    }

    /// Edit the intent before bridging starts
    pub fn update_intent<F>(&mut self, edit: F) -> BridgeResult<()>
    where
        F: FnOnce(&mut TransferIntent),
    {
        let seen = self.context.transitions().len();
        self.context.update_intent(edit)?;
        if let Some(transition) = self.context.transitions().get(seen).cloned() {
            self.emit(BridgeEvent::StepChanged {
                transfer_id: self.id,
                transition,
            });
        }
        Ok(())
    }

    /// Skip the approval step when every token is already approved
    pub async fn sync_approval_status(&mut self) -> BridgeResult<bool> {
        if self.context.step() != TransferStep::AwaitingApproval {
            return Ok(self.context.all_approved());
        }
        let all_approved = self.refresh_approval().await?;
        if all_approved {
            self.advance(TransferAction::AllApproved)?;
        }
        Ok(all_approved)
    }

    /// Re-query the approval checker; returns the all-approved signal
    pub async fn refresh_approval(&mut self) -> BridgeResult<bool> {
        let Some(ready) = self.ready() else {
            return Ok(false);
        };
        let token_address = self.source_token_address(&ready).await?;
        let spender = self.deps.registry.vault_for(
            ready.src_chain_id,
            ready.dest_chain_id,
            ready.token.token_type,
        )?;
        self.check_approval(&ready, token_address, spender).await
    }

    /// Approve the vault of the token's standard as spender
    pub async fn approve(&mut self) -> BridgeResult<Option<H256>> {
        let Some(ready) = self.ready() else {
            debug!("Transfer {}: approve skipped, transfer incomplete", self.id);
            return Ok(None);
        };

        match self.run_approval(ready).await {
            Ok(hash) => Ok(Some(hash)),
            Err(e) => Err(self.fail("approve", e)),
        }
    }

    /// Submit the bridge transaction and see it through to the history store
    pub async fn bridge(&mut self) -> BridgeResult<Option<H256>> {
        let Some(ready) = self.ready() else {
            debug!("Transfer {}: bridge skipped, transfer incomplete", self.id);
            return Ok(None);
        };

        match self.run_bridge(ready).await {
            Ok(hash) => Ok(Some(hash)),
            Err(e) => Err(self.fail("bridge", e)),
        }
    }

    async fn run_approval(&mut self, ready: Ready) -> BridgeResult<H256> {
        transition(self.context.step(), TransferAction::StartApproval)?;

        let paused = self.deps.pause_oracle.is_paused().await?;
        metrics::record_pause_check(paused);
        if paused {
            return Err(BridgeError::BridgePaused);
        }

        self.advance(TransferAction::StartApproval)?;

        let token_address = self.source_token_address(&ready).await?;
        let spender = self.deps.registry.vault_for(
            ready.src_chain_id,
            ready.dest_chain_id,
            ready.token.token_type,
        )?;
        let signer = self.deps.wallets.connected_wallet(ready.src_chain_id).await?;

        info!(
            "Transfer {}: approving {:?} on chain {} for vault {:?}",
            self.id, token_address, ready.src_chain_id, spender
        );
        let hash = ready
            .service
            .approve(ApproveArgs {
                token_ids: self.context.intent().token_ids.clone(),
                token_address,
                spender_address: spender,
                signer,
            })
            .await?;

        let submitted_at = Utc::now();
        self.context.set_submitted(Some(SubmittedTransaction {
            hash,
            direction: TxDirection::Approve,
            chain_id: ready.src_chain_id,
            submitted_at,
        }));
        metrics::record_approval_submitted(ready.src_chain_id, &ready.token.token_type.to_string());
        self.emit(BridgeEvent::ApprovalSubmitted {
            transfer_id: self.id,
            tx_hash: hash,
            chain_id: ready.src_chain_id,
            explorer_url: self.deps.registry.explorer_tx_url(ready.src_chain_id, hash),
        });

        let confirmed = self.wait_for_confirmation(hash, ready.src_chain_id).await?;
        self.context.set_submitted(None);
        record_latency(&confirmed, "approve", submitted_at);
        metrics::record_approval_confirmed(ready.src_chain_id, &ready.token.token_type.to_string());

        let all_approved = self.check_approval(&ready, token_address, spender).await?;
        if all_approved {
            self.advance(TransferAction::ApprovalConfirmed)?;
        } else {
            warn!(
                "Transfer {}: approval {:?} confirmed but tokens still unapproved",
                self.id, hash
            );
            self.advance(TransferAction::ApprovalIncomplete)?;
        }

        self.emit(BridgeEvent::ApprovalConfirmed {
            transfer_id: self.id,
            tx_hash: hash,
            chain_id: ready.src_chain_id,
            all_approved,
        });
        Ok(hash)
    }

    async fn run_bridge(&mut self, ready: Ready) -> BridgeResult<H256> {
        self.advance(TransferAction::StartBridge)?;

        // Everything confirmation needs is settled before the transaction exists
        let explorer_url = self
            .deps
            .registry
            .chain(ready.src_chain_id)
            .map(|chain| chain.explorer_url.clone())
            .ok_or_else(|| BridgeError::MissingContext {
                missing: format!("chain {} in registry", ready.src_chain_id),
            })?;

        let signer = self.deps.wallets.connected_wallet(ready.src_chain_id).await?;
        let intent = self.context.intent().clone();
        let common = CommonBridgeArgs {
            to: intent.effective_recipient().unwrap_or(ready.sender),
            signer,
            src_chain_id: ready.src_chain_id,
            dest_chain_id: ready.dest_chain_id,
            fee: intent.fee,
        };

        if intent.token_ids.is_empty() {
            return Err(BridgeError::TokenIdsNotFound);
        }

        // The builder reads the source address from the token map
        let mut token = ready.token.clone();
        if token.address_on(ready.src_chain_id).is_none() {
            let address = self.source_token_address(&ready).await?;
            token.addresses.insert(ready.src_chain_id, address);
        }

        let args = self
            .deps
            .args_builder
            .build(&token, intent.amount, common, intent.token_ids.clone())?;
        debug!(
            "Transfer {}: bridging {} id(s) via vault {:?}",
            self.id,
            args.token_ids.len(),
            args.token_vault_address
        );

        let hash = ready.service.bridge(args).await?;
        self.confirm_bridge(&ready, hash, &explorer_url).await?;
        Ok(hash)
    }

    async fn confirm_bridge(
        &mut self,
        ready: &Ready,
        hash: H256,
        explorer_url: &str,
    ) -> BridgeResult<()> {
        let explorer_url = explorer_tx_url(explorer_url, hash);
        let submitted_at = Utc::now();
        self.context.set_submitted(Some(SubmittedTransaction {
            hash,
            direction: TxDirection::Bridge,
            chain_id: ready.src_chain_id,
            submitted_at,
        }));
        self.advance(TransferAction::Submitted)?;

        let token_type = ready.token.token_type.to_string();
        metrics::record_bridge_submitted(ready.src_chain_id, ready.dest_chain_id, &token_type);
        info!(
            "Transfer {}: bridge tx {:?} submitted on chain {}",
            self.id, hash, ready.src_chain_id
        );
        self.context.set_status(StatusMessage {
            title_key: STATUS_PENDING_TITLE,
            description_key: STATUS_PENDING_DESCRIPTION,
            explorer_url: Some(explorer_url.clone()),
        });
        self.emit(BridgeEvent::BridgeSubmitted {
            transfer_id: self.id,
            tx_hash: hash,
            chain_id: ready.src_chain_id,
            explorer_url: explorer_url.clone(),
        });

        let confirmed = self.wait_for_confirmation(hash, ready.src_chain_id).await?;
        record_latency(&confirmed, "bridge", submitted_at);

        self.advance(TransferAction::Confirmed)?;
        self.context.set_submitted(None);
        self.context.set_status(StatusMessage {
            title_key: STATUS_DONE_TITLE,
            description_key: STATUS_DONE_DESCRIPTION,
            explorer_url: Some(explorer_url),
        });
        metrics::record_bridge_confirmed(ready.src_chain_id, ready.dest_chain_id, &token_type);
        self.emit(BridgeEvent::BridgeConfirmed {
            transfer_id: self.id,
            tx_hash: hash,
            chain_id: ready.src_chain_id,
        });

        let record = BridgeTransaction {
            hash,
            from: ready.sender,
            amount: self.context.intent().amount,
            symbol: ready.token.symbol.clone(),
            decimals: ready.token.decimals,
            src_chain_id: ready.src_chain_id,
            dest_chain_id: ready.dest_chain_id,
            token_type: ready.token.token_type,
            status: MessageStatus::New,
            timestamp: submitted_at,
        };
        self.deps.store.add_tx_by_address(ready.sender, record).await?;
        info!(
            "Transfer {}: bridge tx {:?} confirmed in block {} and recorded for {:?}",
            self.id, hash, confirmed.block_number, ready.sender
        );
        self.emit(BridgeEvent::TransactionRecorded {
            transfer_id: self.id,
            tx_hash: hash,
            sender: ready.sender,
        });
        Ok(())
    }

    fn ready(&self) -> Option<Ready> {
        let intent = self.context.intent();
        let token = intent.token.clone()?;
        let service = self.deps.bridges.for_type(token.token_type)?;
        Some(Ready {
            service,
            token,
            src_chain_id: intent.src_chain_id?,
            dest_chain_id: intent.dest_chain_id?,
            sender: intent.sender?,
        })
    }

    /// Token address on the source chain, from the token map or the resolver
    async fn source_token_address(&self, ready: &Ready) -> BridgeResult<Address> {
        if let Some(address) = ready.token.address_on(ready.src_chain_id) {
            return Ok(address);
        }

        debug!(
            "Transfer {}: resolving {} on chain {}",
            self.id, ready.token.symbol, ready.src_chain_id
        );
        self.deps
            .resolver
            .resolve(&ready.token, ready.src_chain_id, ready.dest_chain_id)
            .await?
            .filter(|address| !address.is_zero())
            .ok_or_else(|| BridgeError::AddressNotFound {
                chain_id: ready.src_chain_id,
                symbol: ready.token.symbol.clone(),
            })
    }

    async fn check_approval(
        &mut self,
        ready: &Ready,
        token_address: Address,
        spender: Address,
    ) -> BridgeResult<bool> {
        let query = ApprovalQuery {
            token_address,
            token_type: ready.token.token_type,
            token_ids: self.context.intent().token_ids.clone(),
            owner: ready.sender,
            spender,
            chain_id: ready.src_chain_id,
        };
        let approved = self.deps.approvals.is_approved(&query).await?;
        self.context.record_approval(ApprovalRecord {
            token_address,
            chain_id: ready.src_chain_id,
            spender,
            owner: ready.sender,
            approved,
            checked_at: Utc::now(),
        });
        Ok(self.context.all_approved())
    }

    async fn wait_for_confirmation(
        &self,
        hash: H256,
        chain_id: u64,
    ) -> BridgeResult<ConfirmedTransaction> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            result = self.deps.tracker.wait_confirmed(hash, chain_id) => result,
            _ = cancel.cancelled() => {
                warn!("Transfer {}: stopped waiting for {:?}", self.id, hash);
                Err(BridgeError::Cancelled {
                    tx_hash: format!("{:?}", hash),
                })
            }
        }
    }

    fn advance(&mut self, action: TransferAction) -> BridgeResult<()> {
        let transition = self.context.apply(action)?;
        debug!(
            "Transfer {}: {} -> {} ({})",
            self.id, transition.from, transition.to, transition.reason
        );
        self.emit(BridgeEvent::StepChanged {
            transfer_id: self.id,
            transition,
        });
        Ok(())
    }

    /// Reset in-flight steps, then log, count and broadcast the failure
    fn fail(&mut self, action: &'static str, err: BridgeError) -> BridgeError {
        if matches!(
            self.context.step(),
            TransferStep::Approving | TransferStep::Bridging | TransferStep::Confirming
        ) {
            if let Err(e) = self.advance(TransferAction::Fail) {
                error!("Transfer {}: cannot reset after failure: {}", self.id, e);
            }
            self.context.set_submitted(None);
        }

        let kind = err.kind();
        if err.should_alert() {
            error!("Transfer {}: {} failed: {}", self.id, action, err);
        } else {
            warn!("Transfer {}: {} failed ({}): {}", self.id, action, kind.as_str(), err);
        }
        metrics::record_failure(action, kind);

        self.emit(BridgeEvent::Failed {
            transfer_id: self.id,
            kind,
            message_key: kind.message_key(),
            detail: err.to_string(),
        });
        err
    }

    fn emit(&self, event: BridgeEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn record_latency(
    confirmed: &ConfirmedTransaction,
    direction: &str,
    submitted_at: chrono::DateTime<Utc>,
) {
    let elapsed = (Utc::now() - submitted_at).num_milliseconds().max(0) as f64 / 1000.0;
    metrics::record_confirmation_latency(confirmed.chain_id, direction, elapsed);
}
