//! Token and transfer intent types

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// NFT standard of the bridged token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    /// Single-unit NFT
    Erc721,
    /// Multi-unit NFT
    Erc1155,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Erc721 => f.write_str("ERC721"),
            TokenType::Erc1155 => f.write_str("ERC1155"),
        }
    }
}

impl std::str::FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ERC721" => Ok(TokenType::Erc721),
            "ERC1155" => Ok(TokenType::Erc1155),
            other => Err(format!("unknown token type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub token_type: TokenType,
    /// Known deployments, keyed by chain ID
    pub addresses: HashMap<u64, Address>,
}

impl Token {
    /// Address of the token on `chain_id`, if it is known and non-zero
    pub fn address_on(&self, chain_id: u64) -> Option<Address> {
        self.addresses
            .get(&chain_id)
            .copied()
            .filter(|address| !address.is_zero())
    }

    /// Any known deployment, preferring the lowest chain ID for determinism
    pub fn canonical(&self) -> Option<(u64, Address)> {
        self.addresses
            .iter()
            .filter(|(_, address)| !address.is_zero())
            .min_by_key(|(chain_id, _)| **chain_id)
            .map(|(chain_id, address)| (*chain_id, *address))
    }
}

/// Everything describing one user-initiated transfer
///
/// Fields stay optional so a half-filled wizard can be represented; the
/// orchestrator treats missing fields as "not ready yet" rather than as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub token: Option<Token>,
    pub token_ids: Vec<U256>,
    pub src_chain_id: Option<u64>,
    pub dest_chain_id: Option<u64>,
    pub sender: Option<Address>,
    pub recipient: Option<Address>,
    /// Units per token id; only meaningful for ERC1155
    pub amount: U256,
    pub fee: U256,
}

impl Default for TransferIntent {
    fn default() -> Self {
        Self {
            token: None,
            token_ids: Vec::new(),
            src_chain_id: None,
            dest_chain_id: None,
            sender: None,
            recipient: None,
            amount: U256::one(),
            fee: U256::zero(),
        }
    }
}

impl TransferIntent {
    /// Explicit recipient, or the sender when none was chosen
    pub fn effective_recipient(&self) -> Option<Address> {
        self.recipient.or(self.sender)
    }
}
