//! evm-client: Wallet provider boundary and registry contract bindings
//!
//! This crate provides the two seams the rest of the workspace talks to the
//! chain through: [`WalletProvider`] (account access, chain switching and
//! change notifications from the user's wallet) and [`ContractBackend`]
//! (Registry reads and Registrar writes). Production implementations speak
//! JSON-RPC through `ethers`; the `mock` feature adds deterministic doubles.

pub mod contracts;
pub mod networks;
pub mod provider;
pub mod wallet;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::time::Duration;

use corens_core::ProviderError;

pub use contracts::{ContractBackend, EthersBackend};
pub use networks::network_name;
pub use provider::{ProviderEvent, WalletProvider};
pub use wallet::Eip1193Wallet;

/// Bound a wallet or node request by `limit`
pub(crate) async fn timed_request<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ProviderError::Timeout {
            secs: limit.as_secs(),
        })?
}
