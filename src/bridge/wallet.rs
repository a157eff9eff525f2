//! Signer access for the source chain

use crate::error::{BridgeError, BridgeResult};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use tracing::info;

/// A wallet bound to the chain it will sign for
#[derive(Debug, Clone)]
pub struct SigningHandle {
    pub chain_id: u64,
    wallet: LocalWallet,
}

impl SigningHandle {
    pub fn new(chain_id: u64, wallet: LocalWallet) -> Self {
        Self {
            chain_id,
            wallet: wallet.with_chain_id(chain_id),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

/// Hands out the connected wallet for a chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn connected_wallet(&self, chain_id: u64) -> BridgeResult<SigningHandle>;
}

/// Wallet loaded from a private key in the environment
pub struct EnvWalletProvider {
    wallet: LocalWallet,
}

impl EnvWalletProvider {
    pub fn from_env(var: &str) -> BridgeResult<Self> {
        let key = std::env::var(var)
            .map_err(|_| BridgeError::Wallet(format!("{} is not set", var)))?;
        let provider = Self::from_key(&key)?;
        info!("Wallet loaded from {}: {:?}", var, provider.wallet.address());
        Ok(provider)
    }

    pub fn from_key(key: &str) -> BridgeResult<Self> {
        let wallet = key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| BridgeError::Wallet(format!("Invalid private key: {}", e)))?;
        Ok(Self { wallet })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

#[async_trait]
impl WalletProvider for EnvWalletProvider {
    async fn connected_wallet(&self, chain_id: u64) -> BridgeResult<SigningHandle> {
        Ok(SigningHandle::new(chain_id, self.wallet.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_handle_is_bound_to_requested_chain() {
        let provider = EnvWalletProvider::from_key(ANVIL_KEY).unwrap();
        let handle = provider.connected_wallet(10).await.unwrap();

        assert_eq!(handle.chain_id, 10);
        assert_eq!(handle.wallet().chain_id(), 10);
        assert_eq!(
            handle.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[test]
    fn test_prefixed_key_is_accepted() {
        let provider = EnvWalletProvider::from_key(&format!("0x{}", ANVIL_KEY)).unwrap();
        assert_eq!(
            provider.address(),
            EnvWalletProvider::from_key(ANVIL_KEY).unwrap().address()
        );
    }

    #[test]
    fn test_garbage_key_is_wallet_error() {
        let err = EnvWalletProvider::from_key("not-a-key").err().unwrap();
        assert!(matches!(err, BridgeError::Wallet(_)));
    }

    #[test]
    fn test_missing_env_var_is_wallet_error() {
        let err = EnvWalletProvider::from_env("NFT_BRIDGE_TEST_UNSET_KEY")
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Wallet(_)));
    }
}
