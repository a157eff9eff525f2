//! In-memory collaborators for orchestrator tests

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use nft_bridge_orchestrator::bridge::{
    ApproveArgs, BridgeArgs, BridgeServices, EnvWalletProvider, NftBridge, StandardArgsBuilder,
};
use nft_bridge_orchestrator::chain::{
    AddressResolver, ApprovalChecker, ApprovalQuery, ChainRegistry, ConfirmedTransaction,
    PauseOracle, TransactionTracker,
};
use nft_bridge_orchestrator::config::{ChainConfig, RouteConfig};
use nft_bridge_orchestrator::error::{BridgeError, BridgeResult};
use nft_bridge_orchestrator::events::BridgeEvent;
use nft_bridge_orchestrator::state::MemoryTransactionStore;
use nft_bridge_orchestrator::transfer::{
    Collaborators, Token, TokenType, TransferIntent, TransferOrchestrator,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

pub const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const SRC_CHAIN: u64 = 1;
pub const DEST_CHAIN: u64 = 10;

pub fn erc721_vault() -> Address {
    Address::from_low_u64_be(0x721)
}

pub fn erc1155_vault() -> Address {
    Address::from_low_u64_be(0x1155)
}

pub fn token_address() -> Address {
    Address::from_low_u64_be(0xaaa)
}

pub fn sender() -> Address {
    Address::from_low_u64_be(0xbeef)
}

pub fn registry() -> ChainRegistry {
    let chain = |chain_id: u64, explorer: &str| ChainConfig {
        chain_id,
        name: format!("chain-{}", chain_id),
        rpc_urls: vec!["http://localhost:8545".to_string()],
        explorer_url: explorer.to_string(),
        confirmation_blocks: None,
        enabled: true,
    };
    let route = |src_chain_id: u64, dest_chain_id: u64| RouteConfig {
        src_chain_id,
        dest_chain_id,
        erc721_vault_address: erc721_vault(),
        erc1155_vault_address: erc1155_vault(),
    };
    ChainRegistry::new(
        vec![
            chain(SRC_CHAIN, "https://etherscan.io"),
            chain(DEST_CHAIN, "https://optimistic.etherscan.io"),
        ],
        // 5 has a route but no chain entry
        vec![route(SRC_CHAIN, DEST_CHAIN), route(5, DEST_CHAIN)],
    )
}

pub fn token(token_type: TokenType) -> Token {
    Token {
        name: "Test Collection".to_string(),
        symbol: "TST".to_string(),
        decimals: 0,
        token_type,
        addresses: HashMap::from([(SRC_CHAIN, token_address())]),
    }
}

/// ERC721 id 42 from chain 1 to chain 10
pub fn intent() -> TransferIntent {
    TransferIntent {
        token: Some(token(TokenType::Erc721)),
        token_ids: vec![U256::from(42)],
        src_chain_id: Some(SRC_CHAIN),
        dest_chain_id: Some(DEST_CHAIN),
        sender: Some(sender()),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakePauseOracle {
    pub paused: AtomicBool,
}

#[async_trait]
impl PauseOracle for FakePauseOracle {
    async fn is_paused(&self) -> BridgeResult<bool> {
        Ok(self.paused.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct FakeApprovals {
    pub approved: AtomicBool,
    pub queries: Mutex<Vec<ApprovalQuery>>,
}

#[async_trait]
impl ApprovalChecker for FakeApprovals {
    async fn is_approved(&self, query: &ApprovalQuery) -> BridgeResult<bool> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.approved.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct FakeResolver {
    pub resolved: Mutex<Option<Address>>,
    pub calls: Mutex<Vec<(u64, u64)>>,
}

#[async_trait]
impl AddressResolver for FakeResolver {
    async fn resolve(
        &self,
        _token: &Token,
        src_chain_id: u64,
        dest_chain_id: u64,
    ) -> BridgeResult<Option<Address>> {
        self.calls.lock().unwrap().push((src_chain_id, dest_chain_id));
        Ok(*self.resolved.lock().unwrap())
    }
}

/// Bridge service recording every call; hashes are derived from the call count
#[derive(Default)]
pub struct RecordingBridge {
    pub approvals: Mutex<Vec<ApproveArgs>>,
    pub bridges: Mutex<Vec<BridgeArgs>>,
    pub bridge_error: Mutex<Option<String>>,
}

impl RecordingBridge {
    pub fn approve_calls(&self) -> usize {
        self.approvals.lock().unwrap().len()
    }

    pub fn bridge_calls(&self) -> usize {
        self.bridges.lock().unwrap().len()
    }
}

#[async_trait]
impl NftBridge for RecordingBridge {
    async fn approve(&self, args: ApproveArgs) -> BridgeResult<H256> {
        let mut approvals = self.approvals.lock().unwrap();
        approvals.push(args);
        Ok(H256::from_low_u64_be(0xa000 + approvals.len() as u64))
    }

    async fn bridge(&self, args: BridgeArgs) -> BridgeResult<H256> {
        if let Some(message) = self.bridge_error.lock().unwrap().clone() {
            return Err(BridgeError::Transaction(message));
        }
        let mut bridges = self.bridges.lock().unwrap();
        bridges.push(args);
        Ok(H256::from_low_u64_be(0xb000 + bridges.len() as u64))
    }
}

/// Tracker that confirms immediately, after a gate opens, or never
pub enum TrackerMode {
    Immediate,
    Gated(Arc<Notify>),
    Never,
}

pub struct FakeTracker {
    pub mode: TrackerMode,
    pub waits: Mutex<Vec<(H256, u64)>>,
}

impl FakeTracker {
    pub fn new(mode: TrackerMode) -> Self {
        Self {
            mode,
            waits: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TransactionTracker for FakeTracker {
    async fn wait_confirmed(
        &self,
        tx_hash: H256,
        chain_id: u64,
    ) -> BridgeResult<ConfirmedTransaction> {
        self.waits.lock().unwrap().push((tx_hash, chain_id));
        match &self.mode {
            TrackerMode::Immediate => {}
            TrackerMode::Gated(gate) => gate.notified().await,
            TrackerMode::Never => std::future::pending::<()>().await,
        }
        Ok(ConfirmedTransaction {
            tx_hash,
            chain_id,
            block_number: 1_000,
            confirmations: 2,
        })
    }
}

/// Every collaborator, kept around for assertions after the run
pub struct Harness {
    pub registry: Arc<ChainRegistry>,
    pub pause: Arc<FakePauseOracle>,
    pub approvals: Arc<FakeApprovals>,
    pub resolver: Arc<FakeResolver>,
    pub erc721: Arc<RecordingBridge>,
    pub erc1155: Arc<RecordingBridge>,
    pub tracker: Arc<FakeTracker>,
    pub store: Arc<MemoryTransactionStore>,
    pub bind_erc1155: bool,
}

impl Harness {
    pub fn new(mode: TrackerMode) -> Self {
        Self {
            registry: Arc::new(registry()),
            pause: Arc::new(FakePauseOracle::default()),
            approvals: Arc::new(FakeApprovals::default()),
            resolver: Arc::new(FakeResolver::default()),
            erc721: Arc::new(RecordingBridge::default()),
            erc1155: Arc::new(RecordingBridge::default()),
            tracker: Arc::new(FakeTracker::new(mode)),
            store: Arc::new(MemoryTransactionStore::new()),
            bind_erc1155: true,
        }
    }

    pub fn approved(self) -> Self {
        self.approvals.approved.store(true, Ordering::SeqCst);
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        let mut bridges = BridgeServices::new().with_erc721(self.erc721.clone());
        if self.bind_erc1155 {
            bridges = bridges.with_erc1155(self.erc1155.clone());
        }
        let wallets = EnvWalletProvider::from_key(ANVIL_KEY).expect("anvil key parses");

        Collaborators {
            registry: self.registry.clone(),
            resolver: self.resolver.clone(),
            approvals: self.approvals.clone(),
            bridges,
            args_builder: Arc::new(StandardArgsBuilder::new(self.registry.clone())),
            tracker: self.tracker.clone(),
            store: self.store.clone(),
            pause_oracle: self.pause.clone(),
            wallets: Arc::new(wallets),
        }
    }

    pub fn orchestrator(&self, intent: TransferIntent) -> TransferOrchestrator {
        TransferOrchestrator::new(self.collaborators(), intent)
    }
}

/// Receive events until one matches, failing after a second
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<BridgeEvent>, matches: F) -> BridgeEvent
where
    F: Fn(&BridgeEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event stream closed: {}", e),
            }
        }
    })
    .await
    .expect("event not observed within a second")
}

pub fn drain(rx: &mut broadcast::Receiver<BridgeEvent>) -> Vec<BridgeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
