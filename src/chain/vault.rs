//! Vault and token contract queries
//!
//! Read-only collaborators of the orchestrator:
//! - pause state of the bridge vaults
//! - approval status of a token for a vault (the spender)
//! - bridged token address lookup on a chain the token was not minted on

use super::{ChainReader, ChainRegistry};
use crate::error::{BridgeError, BridgeResult};
use crate::transfer::{Token, TokenType};

use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token as AbiToken};
use ethers::types::{Address, Bytes, U256};
use futures::future::join_all;
use serde::Serialize;
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use tracing::{debug, warn};

const PAUSED: &str = "paused()";
const IS_APPROVED_FOR_ALL: &str = "isApprovedForAll(address,address)";
const GET_APPROVED: &str = "getApproved(uint256)";
const CANONICAL_TO_BRIDGED: &str = "canonicalToBridged(uint256,address)";

/// Reports whether bridging is currently paused
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PauseOracle: Send + Sync {
    async fn is_paused(&self) -> BridgeResult<bool>;
}

/// Inputs of one approval-status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalQuery {
    pub token_address: Address,
    pub token_type: TokenType,
    pub token_ids: Vec<U256>,
    pub owner: Address,
    pub spender: Address,
    pub chain_id: u64,
}

/// Reads on-chain approval of a token for a spender
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApprovalChecker: Send + Sync {
    async fn is_approved(&self, query: &ApprovalQuery) -> BridgeResult<bool>;
}

/// Finds a token's address on a chain where the token map has none
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(
        &self,
        token: &Token,
        src_chain_id: u64,
        dest_chain_id: u64,
    ) -> BridgeResult<Option<Address>>;
}

/// First four bytes of the keccak256 hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// ABI-encode a call: selector followed by the encoded arguments
pub fn encode_call(signature: &str, args: &[AbiToken]) -> Bytes {
    let mut data = selector(signature).to_vec();
    data.extend(abi::encode(args));
    Bytes::from(data)
}

pub fn decode_bool(output: &[u8]) -> BridgeResult<bool> {
    match abi::decode(&[ParamType::Bool], output) {
        Ok(tokens) => match tokens.into_iter().next() {
            Some(AbiToken::Bool(value)) => Ok(value),
            other => Err(BridgeError::Contract(format!("expected bool, got {:?}", other))),
        },
        Err(e) => Err(BridgeError::Contract(format!("cannot decode bool: {}", e))),
    }
}

pub fn decode_address(output: &[u8]) -> BridgeResult<Address> {
    match abi::decode(&[ParamType::Address], output) {
        Ok(tokens) => match tokens.into_iter().next() {
            Some(AbiToken::Address(value)) => Ok(value),
            other => Err(BridgeError::Contract(format!(
                "expected address, got {:?}",
                other
            ))),
        },
        Err(e) => Err(BridgeError::Contract(format!("cannot decode address: {}", e))),
    }
}

/// Pause oracle that asks every configured vault for `paused()`
pub struct VaultPauseOracle {
    reader: Arc<dyn ChainReader>,
    registry: Arc<ChainRegistry>,
}

impl VaultPauseOracle {
    pub fn new(reader: Arc<dyn ChainReader>, registry: Arc<ChainRegistry>) -> Self {
        Self { reader, registry }
    }

    async fn vault_paused(&self, chain_id: u64, vault: Address) -> BridgeResult<bool> {
        let output = self
            .reader
            .call(chain_id, vault, encode_call(PAUSED, &[]))
            .await?;
        decode_bool(&output)
    }
}

#[async_trait]
impl PauseOracle for VaultPauseOracle {
    /// Any paused vault pauses the whole bridge
    async fn is_paused(&self) -> BridgeResult<bool> {
        let checks = self.registry.routes().flat_map(|route| {
            [
                (route.src_chain_id, route.erc721_vault_address),
                (route.src_chain_id, route.erc1155_vault_address),
            ]
        });

        let results = join_all(
            checks.map(|(chain_id, vault)| async move {
                (chain_id, vault, self.vault_paused(chain_id, vault).await)
            }),
        )
        .await;

        let mut paused = false;
        for (chain_id, vault, result) in results {
            if result? {
                warn!("Vault {:?} on chain {} is paused", vault, chain_id);
                paused = true;
            }
        }

        Ok(paused)
    }
}

/// Approval checker reading ERC721/ERC1155 approval views
pub struct VaultApprovalChecker {
    reader: Arc<dyn ChainReader>,
}

impl VaultApprovalChecker {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl ApprovalChecker for VaultApprovalChecker {
    async fn is_approved(&self, query: &ApprovalQuery) -> BridgeResult<bool> {
        let output = self
            .reader
            .call(
                query.chain_id,
                query.token_address,
                encode_call(
                    IS_APPROVED_FOR_ALL,
                    &[AbiToken::Address(query.owner), AbiToken::Address(query.spender)],
                ),
            )
            .await?;
        if decode_bool(&output)? {
            return Ok(true);
        }

        // ERC1155 has no per-id approval
        if query.token_type == TokenType::Erc1155 || query.token_ids.is_empty() {
            return Ok(false);
        }

        for token_id in &query.token_ids {
            let output = self
                .reader
                .call(
                    query.chain_id,
                    query.token_address,
                    encode_call(GET_APPROVED, &[AbiToken::Uint(*token_id)]),
                )
                .await?;
            if decode_address(&output)? != query.spender {
                debug!(
                    "Token {} of {:?} not approved for {:?}",
                    token_id, query.token_address, query.spender
                );
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Resolver asking the source-chain vault for the bridged twin of the canonical token
pub struct VaultAddressResolver {
    reader: Arc<dyn ChainReader>,
    registry: Arc<ChainRegistry>,
}

impl VaultAddressResolver {
    pub fn new(reader: Arc<dyn ChainReader>, registry: Arc<ChainRegistry>) -> Self {
        Self { reader, registry }
    }
}

#[async_trait]
impl AddressResolver for VaultAddressResolver {
    async fn resolve(
        &self,
        token: &Token,
        src_chain_id: u64,
        dest_chain_id: u64,
    ) -> BridgeResult<Option<Address>> {
        let Some((canonical_chain_id, canonical_address)) = token.canonical() else {
            return Ok(None);
        };
        if canonical_chain_id == src_chain_id {
            return Ok(Some(canonical_address));
        }

        let vault = self
            .registry
            .vault_for(src_chain_id, dest_chain_id, token.token_type)?;
        let output = self
            .reader
            .call(
                src_chain_id,
                vault,
                encode_call(
                    CANONICAL_TO_BRIDGED,
                    &[
                        AbiToken::Uint(U256::from(canonical_chain_id)),
                        AbiToken::Address(canonical_address),
                    ],
                ),
            )
            .await?;

        let bridged = decode_address(&output)?;
        debug!(
            "{} bridged address on chain {}: {:?}",
            token.symbol, src_chain_id, bridged
        );
        Ok(Some(bridged).filter(|address| !address.is_zero()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainReader;
    use crate::config::{ChainConfig, RouteConfig};
    use std::collections::HashMap;

    fn owner() -> Address {
        Address::from_low_u64_be(0xbeef)
    }

    fn vault() -> Address {
        Address::from_low_u64_be(0x721)
    }

    fn registry() -> Arc<ChainRegistry> {
        let chain = |chain_id: u64| ChainConfig {
            chain_id,
            name: format!("chain-{}", chain_id),
            rpc_urls: vec!["http://localhost:8545".to_string()],
            explorer_url: "https://explorer.example".to_string(),
            confirmation_blocks: None,
            enabled: true,
        };
        let route = |src_chain_id: u64, dest_chain_id: u64| RouteConfig {
            src_chain_id,
            dest_chain_id,
            erc721_vault_address: vault(),
            erc1155_vault_address: Address::from_low_u64_be(0x1155),
        };
        Arc::new(ChainRegistry::new(
            vec![chain(1), chain(10)],
            vec![route(1, 10), route(10, 1)],
        ))
    }

    fn query(token_type: TokenType, token_ids: Vec<u64>) -> ApprovalQuery {
        ApprovalQuery {
            token_address: Address::from_low_u64_be(0xaaa),
            token_type,
            token_ids: token_ids.into_iter().map(U256::from).collect(),
            owner: owner(),
            spender: vault(),
            chain_id: 1,
        }
    }

    fn returns_bool(value: bool) -> BridgeResult<Bytes> {
        Ok(Bytes::from(abi::encode(&[AbiToken::Bool(value)])))
    }

    fn returns_address(value: Address) -> BridgeResult<Bytes> {
        Ok(Bytes::from(abi::encode(&[AbiToken::Address(value)])))
    }

    fn calls(data: &Bytes, signature: &str) -> bool {
        data.len() >= 4 && data[..4] == selector(signature)
    }

    /// getApproved answers: token id -> approved operator
    fn erc721_reader(operators: HashMap<u64, Address>) -> MockChainReader {
        let mut reader = MockChainReader::new();
        reader
            .expect_call()
            .withf(|_, _, data| calls(data, IS_APPROVED_FOR_ALL))
            .returning(|_, _, _| returns_bool(false));
        reader
            .expect_call()
            .withf(|_, _, data| calls(data, GET_APPROVED))
            .returning(move |_, _, data| {
                let id = U256::from_big_endian(&data[4..36]).as_u64();
                returns_address(operators.get(&id).copied().unwrap_or_default())
            });
        reader
    }

    #[tokio::test]
    async fn test_erc721_needs_every_id_approved() {
        let checker = VaultApprovalChecker::new(Arc::new(erc721_reader(HashMap::from([
            (1, vault()),
            (2, Address::from_low_u64_be(0xdead)),
        ]))));
        assert!(!checker
            .is_approved(&query(TokenType::Erc721, vec![1, 2]))
            .await
            .unwrap());

        let checker = VaultApprovalChecker::new(Arc::new(erc721_reader(HashMap::from([
            (1, vault()),
            (2, vault()),
        ]))));
        assert!(checker
            .is_approved(&query(TokenType::Erc721, vec![1, 2]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_operator_approval_skips_per_id_lookup() {
        let mut reader = MockChainReader::new();
        reader
            .expect_call()
            .withf(|chain_id, to, data| {
                *chain_id == 1
                    && *to == Address::from_low_u64_be(0xaaa)
                    && calls(data, IS_APPROVED_FOR_ALL)
            })
            .times(1)
            .returning(|_, _, _| returns_bool(true));
        let checker = VaultApprovalChecker::new(Arc::new(reader));

        assert!(checker
            .is_approved(&query(TokenType::Erc721, vec![1, 2, 3]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_erc1155_has_no_per_id_approval() {
        let mut reader = MockChainReader::new();
        reader
            .expect_call()
            .times(1)
            .returning(|_, _, _| returns_bool(false));
        let checker = VaultApprovalChecker::new(Arc::new(reader));

        assert!(!checker
            .is_approved(&query(TokenType::Erc1155, vec![1]))
            .await
            .unwrap());
    }

    fn bridged_token(addresses: HashMap<u64, Address>) -> Token {
        Token {
            name: "Test".to_string(),
            symbol: "TST".to_string(),
            decimals: 0,
            token_type: TokenType::Erc721,
            addresses,
        }
    }

    #[tokio::test]
    async fn test_resolver_returns_canonical_address_on_its_chain() {
        let mut reader = MockChainReader::new();
        reader.expect_call().never();
        let resolver = VaultAddressResolver::new(Arc::new(reader), registry());
        let canonical = Address::from_low_u64_be(0xc0);

        let token = bridged_token(HashMap::from([(1, canonical)]));
        assert_eq!(resolver.resolve(&token, 1, 10).await.unwrap(), Some(canonical));
    }

    #[tokio::test]
    async fn test_resolver_asks_source_vault_for_bridged_twin() {
        let canonical = Address::from_low_u64_be(0xc0);
        let twin = Address::from_low_u64_be(0x7e1);
        let mut reader = MockChainReader::new();
        reader
            .expect_call()
            .withf(move |chain_id, to, data| {
                let args = abi::encode(&[
                    AbiToken::Uint(U256::from(1u64)),
                    AbiToken::Address(canonical),
                ]);
                *chain_id == 10
                    && *to == vault()
                    && calls(data, CANONICAL_TO_BRIDGED)
                    && data[4..] == args[..]
            })
            .times(1)
            .returning(move |_, _, _| returns_address(twin));
        let resolver = VaultAddressResolver::new(Arc::new(reader), registry());

        let token = bridged_token(HashMap::from([(1, canonical)]));
        assert_eq!(resolver.resolve(&token, 10, 1).await.unwrap(), Some(twin));
    }

    #[tokio::test]
    async fn test_resolver_treats_zero_address_as_unbridged() {
        let mut reader = MockChainReader::new();
        reader
            .expect_call()
            .returning(|_, _, _| returns_address(Address::zero()));
        let resolver = VaultAddressResolver::new(Arc::new(reader), registry());

        let token = bridged_token(HashMap::from([(1, Address::from_low_u64_be(0xc0))]));
        assert_eq!(resolver.resolve(&token, 10, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_any_paused_vault_pauses_bridging() {
        let mut reader = MockChainReader::new();
        reader
            .expect_call()
            .withf(|_, _, data| calls(data, PAUSED))
            .returning(|chain_id, to, _| {
                returns_bool(chain_id == 10 && to == Address::from_low_u64_be(0x1155))
            });
        let oracle = VaultPauseOracle::new(Arc::new(reader), registry());
        assert!(oracle.is_paused().await.unwrap());

        let mut reader = MockChainReader::new();
        reader
            .expect_call()
            .times(4)
            .returning(|_, _, _| returns_bool(false));
        let oracle = VaultPauseOracle::new(Arc::new(reader), registry());
        assert!(!oracle.is_paused().await.unwrap());
    }

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector(PAUSED)), "5c975abb");
        assert_eq!(hex::encode(selector(IS_APPROVED_FOR_ALL)), "e985e9c5");
        assert_eq!(hex::encode(selector(GET_APPROVED)), "081812fc");
    }

    #[test]
    fn test_encode_call_layout() {
        let owner = Address::from_low_u64_be(0xaa);
        let spender = Address::from_low_u64_be(0xbb);
        let data = encode_call(
            IS_APPROVED_FOR_ALL,
            &[AbiToken::Address(owner), AbiToken::Address(spender)],
        );
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &selector(IS_APPROVED_FOR_ALL));
        assert_eq!(data[4 + 31], 0xaa);
        assert_eq!(data[4 + 63], 0xbb);
    }

    #[test]
    fn test_decode_outputs() {
        let mut word = [0u8; 32];
        word[31] = 1;
        assert!(decode_bool(&word).unwrap());

        let address = Address::from_low_u64_be(0x1234);
        let encoded = abi::encode(&[AbiToken::Address(address)]);
        assert_eq!(decode_address(&encoded).unwrap(), address);

        assert!(decode_bool(&[]).is_err());
    }
}
