//! Wallet provider boundary
//!
//! Models an injected EIP-1193 wallet: account access, the active chain,
//! chain switching, and the `accountsChanged` / `chainChanged` /
//! `disconnect` notifications.

use std::sync::Arc;

use async_trait::async_trait;
use corens_core::{ChainConfig, ChainId, ProviderError};
use ethers::types::Address;
use tokio::sync::broadcast;

use crate::ContractBackend;

/// Notification emitted by the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Exposed accounts changed; empty means access was revoked
    AccountsChanged(Vec<Address>),
    /// Active chain changed
    ChainChanged(ChainId),
    /// Wallet lost its connection to every chain
    Disconnected,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompt the user for account access (`eth_requestAccounts`)
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Chain the wallet is currently on (`eth_chainId`)
    async fn chain_id(&self) -> Result<ChainId, ProviderError>;

    /// Ask the wallet to switch chains (`wallet_switchEthereumChain`)
    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), ProviderError>;

    /// Ask the wallet to add a chain it does not know (`wallet_addEthereumChain`)
    async fn add_chain(&self, chain: &ChainConfig) -> Result<(), ProviderError>;

    /// Subscribe to wallet notifications. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    /// Contract backend that signs through the wallet as `account`
    fn signer(&self, account: Address) -> Result<Arc<dyn ContractBackend>, ProviderError>;
}
