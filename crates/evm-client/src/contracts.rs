//! Registry and Registrar contract bindings
//!
//! [`ContractBackend`] is the narrow contract surface the workflow needs.
//! [`EthersBackend`] implements it over an `ethers` JSON-RPC provider; when
//! the provider carries a default sender, writes are signed by the wallet
//! behind it (`eth_sendTransaction`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corens_core::{ChainError, LookupKey, ProviderError, RegistrationRecord, TxReceipt};
use ethers::contract::abigen;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, H256, U256, U64};

use crate::wallet::classify_provider_error;

abigen!(
    RegistryContract,
    r#"[
        function getRecord(bytes32 name) external view returns (address, address, uint256, uint256)
    ]"#
);

abigen!(
    RegistrarContract,
    r#"[
        function register(bytes32 name) external payable
    ]"#
);

/// Default timeout for contract reads and receipt queries (30 seconds).
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ContractBackend: Send + Sync {
    /// `Registry.getRecord(key)`
    async fn get_record(
        &self,
        registry: Address,
        key: LookupKey,
    ) -> Result<RegistrationRecord, ChainError>;

    /// Submit `Registrar.register(key)` carrying `value` wei; returns the tx hash
    async fn register(
        &self,
        registrar: Address,
        key: LookupKey,
        value: U256,
    ) -> Result<H256, ChainError>;

    /// Receipt of a submitted transaction, `None` while it is unmined
    async fn receipt(&self, tx_hash: H256) -> Result<Option<TxReceipt>, ChainError>;
}

/// Contract backend over an `ethers` HTTP provider
#[derive(Clone)]
pub struct EthersBackend {
    client: Arc<Provider<Http>>,
}

impl EthersBackend {
    pub fn new(client: Provider<Http>) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Read-only backend on a public RPC endpoint
    pub fn connect_http(url: &str) -> Result<Self, ProviderError> {
        let provider = Provider::<Http>::try_from(url).map_err(|e| ProviderError::Transport {
            message: format!("{}: {}", url, e),
        })?;
        Ok(Self::new(provider))
    }
}

#[async_trait]
impl ContractBackend for EthersBackend {
    async fn get_record(
        &self,
        registry: Address,
        key: LookupKey,
    ) -> Result<RegistrationRecord, ChainError> {
        let contract = RegistryContract::new(registry, self.client.clone());
        let call = contract.get_record(key.0);

        let (owner, resolver, registration_time, expiration) =
            tokio::time::timeout(CALL_TIMEOUT, call.call())
                .await
                .map_err(|_| ChainError::Call {
                    message: format!("getRecord timed out after {}s", CALL_TIMEOUT.as_secs()),
                })?
                .map_err(|e| ChainError::Call {
                    message: e.to_string(),
                })?;

        Ok(RegistrationRecord {
            owner,
            resolver,
            registration_time: saturating_u64(registration_time),
            expiration: saturating_u64(expiration),
        })
    }

    async fn register(
        &self,
        registrar: Address,
        key: LookupKey,
        value: U256,
    ) -> Result<H256, ChainError> {
        let contract = RegistrarContract::new(registrar, self.client.clone());
        let call = contract.register(key.0).value(value);

        let pending = self
            .client
            .send_transaction(call.tx, None)
            .await
            .map_err(|e| ChainError::Submission(classify_provider_error(&e)))?;

        let tx_hash = pending.tx_hash();
        tracing::info!("Submitted register({}) as {:?}", key, tx_hash);
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: H256) -> Result<Option<TxReceipt>, ChainError> {
        let receipt = tokio::time::timeout(
            CALL_TIMEOUT,
            self.client.get_transaction_receipt(tx_hash),
        )
        .await
        .map_err(|_| ChainError::Receipt {
            message: format!("receipt query timed out after {}s", CALL_TIMEOUT.as_secs()),
        })?
        .map_err(|e| ChainError::Receipt {
            message: e.to_string(),
        })?;

        Ok(receipt.map(|r| TxReceipt {
            tx_hash,
            block_number: r.block_number.map(|n| n.as_u64()),
            // Pre-Byzantium receipts carry no status
            success: r.status != Some(U64::zero()),
        }))
    }
}

/// Clamp a uint256 timestamp into u64
fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}
