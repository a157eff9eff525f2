//! Per-standard bridge services and their call arguments
//!
//! The services themselves build and sign the vault transactions; this module
//! only defines their interface, dispatches on the token standard and
//! assembles the arguments.

pub mod wallet;

pub use wallet::{EnvWalletProvider, SigningHandle, WalletProvider};

use crate::chain::ChainRegistry;
use crate::error::{BridgeError, BridgeResult};
use crate::transfer::{Token, TokenType};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ApproveArgs {
    pub token_ids: Vec<U256>,
    pub token_address: Address,
    /// Vault that will take custody of the tokens
    pub spender_address: Address,
    pub signer: SigningHandle,
}

/// Arguments shared by every bridge call, regardless of standard
#[derive(Debug, Clone)]
pub struct CommonBridgeArgs {
    pub to: Address,
    pub signer: SigningHandle,
    pub src_chain_id: u64,
    pub dest_chain_id: u64,
    pub fee: U256,
}

#[derive(Debug, Clone)]
pub struct BridgeArgs {
    pub common: CommonBridgeArgs,
    pub token_type: TokenType,
    pub token_address: Address,
    pub token_vault_address: Address,
    pub token_ids: Vec<U256>,
    /// One entry per token id for ERC1155, empty for ERC721
    pub amounts: Vec<U256>,
}

/// Submits approve and bridge transactions for one token standard
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NftBridge: Send + Sync {
    async fn approve(&self, args: ApproveArgs) -> BridgeResult<H256>;

    async fn bridge(&self, args: BridgeArgs) -> BridgeResult<H256>;
}

/// Bridge services bound per token standard
#[derive(Clone, Default)]
pub struct BridgeServices {
    pub erc721: Option<Arc<dyn NftBridge>>,
    pub erc1155: Option<Arc<dyn NftBridge>>,
}

impl BridgeServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_erc721(mut self, service: Arc<dyn NftBridge>) -> Self {
        self.erc721 = Some(service);
        self
    }

    pub fn with_erc1155(mut self, service: Arc<dyn NftBridge>) -> Self {
        self.erc1155 = Some(service);
        self
    }

    pub fn for_type(&self, token_type: TokenType) -> Option<Arc<dyn NftBridge>> {
        match token_type {
            TokenType::Erc721 => self.erc721.clone(),
            TokenType::Erc1155 => self.erc1155.clone(),
        }
    }
}

/// Turns the common arguments and the selected ids into a full bridge call
#[cfg_attr(test, mockall::automock)]
pub trait BridgeArgsBuilder: Send + Sync {
    fn build(
        &self,
        token: &Token,
        amount: U256,
        common: CommonBridgeArgs,
        token_ids: Vec<U256>,
    ) -> BridgeResult<BridgeArgs>;
}

/// Default builder: token address on the source chain, vault from the registry
pub struct StandardArgsBuilder {
    registry: Arc<ChainRegistry>,
}

impl StandardArgsBuilder {
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        Self { registry }
    }
}

impl BridgeArgsBuilder for StandardArgsBuilder {
    fn build(
        &self,
        token: &Token,
        amount: U256,
        common: CommonBridgeArgs,
        token_ids: Vec<U256>,
    ) -> BridgeResult<BridgeArgs> {
        let token_address =
            token
                .address_on(common.src_chain_id)
                .ok_or_else(|| BridgeError::AddressNotFound {
                    chain_id: common.src_chain_id,
                    symbol: token.symbol.clone(),
                })?;
        let token_vault_address =
            self.registry
                .vault_for(common.src_chain_id, common.dest_chain_id, token.token_type)?;

        let amounts = match token.token_type {
            TokenType::Erc721 => Vec::new(),
            TokenType::Erc1155 => vec![amount; token_ids.len()],
        };

        Ok(BridgeArgs {
            common,
            token_type: token.token_type,
            token_address,
            token_vault_address,
            token_ids,
            amounts,
        })
    }
}
