//! Registry and Registrar client construction
//!
//! Clients are views built on demand from the session's current signer and
//! the configured contract addresses. They hold the signer only for their
//! own lifetime, so a client built before a reconnect is never reused after it.

use std::sync::Arc;

use corens_core::{
    ChainConfig, ChainError, Error, LookupKey, RegistrationRecord, Result, TxReceipt,
};
use ethers::types::{Address, H256, U256};
use evm_client::ContractBackend;

use crate::WalletSession;

/// Read handle on the Registry contract
pub struct RegistryClient {
    address: Address,
    backend: Arc<dyn ContractBackend>,
}

impl RegistryClient {
    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn get_record(
        &self,
        key: LookupKey,
    ) -> std::result::Result<RegistrationRecord, ChainError> {
        self.backend.get_record(self.address, key).await
    }
}

/// Write handle on the Registrar contract, signing as `account`
pub struct RegistrarClient {
    address: Address,
    account: Address,
    backend: Arc<dyn ContractBackend>,
}

impl RegistrarClient {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Submit `register(key)` paying `fee` wei
    pub async fn register(&self, key: LookupKey, fee: U256) -> std::result::Result<H256, ChainError> {
        self.backend.register(self.address, key, fee).await
    }

    pub async fn receipt(&self, tx_hash: H256) -> std::result::Result<Option<TxReceipt>, ChainError> {
        self.backend.receipt(tx_hash).await
    }
}

#[derive(Clone)]
pub struct ContractGateway {
    session: WalletSession,
    chain: Arc<ChainConfig>,
    /// Read-only backend on the public RPC endpoint
    public: Option<Arc<dyn ContractBackend>>,
}

impl ContractGateway {
    pub fn new(
        session: WalletSession,
        chain: ChainConfig,
        public: Option<Arc<dyn ContractBackend>>,
    ) -> Self {
        Self {
            session,
            chain: Arc::new(chain),
            public,
        }
    }

    /// Registry reader.
    ///
    /// Uses the wallet while it is on the registry's chain, otherwise the
    /// public RPC endpoint, so reads keep working on the wrong network.
    ///
    /// # Errors
    /// `ProviderUnavailable` when there is neither a signer nor a public endpoint
    pub async fn registry_client(&self) -> Result<RegistryClient> {
        let signer = self.session.lend_signer().await;

        let backend = match (signer, &self.public) {
            (Some(signer), _) if signer.chain_id == Some(self.chain.chain_id) => signer.backend,
            (_, Some(public)) => public.clone(),
            (Some(signer), None) => signer.backend,
            (None, None) => return Err(Error::ProviderUnavailable),
        };

        Ok(RegistryClient {
            address: self.chain.registry,
            backend,
        })
    }

    /// Registrar writer.
    ///
    /// # Errors
    /// `NotConnected` without a connected session
    pub async fn registrar_client(&self) -> Result<RegistrarClient> {
        let signer = self.session.lend_signer().await.ok_or(Error::NotConnected)?;
        Ok(RegistrarClient {
            address: self.chain.registrar,
            account: signer.account,
            backend: signer.backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryMarker;
    use corens_core::unix_now;
    use evm_client::mock::{MockContracts, MockWallet};

    fn chain() -> ChainConfig {
        ChainConfig {
            registry: Address::from_low_u64_be(0x1001),
            registrar: Address::from_low_u64_be(0x1002),
            ..ChainConfig::default()
        }
    }

    fn taken() -> RegistrationRecord {
        RegistrationRecord {
            owner: Address::from_low_u64_be(0xabc),
            resolver: Address::zero(),
            registration_time: 1,
            expiration: unix_now() + 3600,
        }
    }

    #[tokio::test]
    async fn test_no_provider_at_all() {
        let session = WalletSession::new(None, Arc::new(MemoryMarker::default()));
        let gateway = ContractGateway::new(session, chain(), None);

        assert!(matches!(
            gateway.registry_client().await,
            Err(Error::ProviderUnavailable)
        ));
        assert!(matches!(
            gateway.registrar_client().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_public_backend_serves_reads_when_disconnected() {
        let public = MockContracts::new();
        public.set_record("bob.core", taken());
        let session = WalletSession::new(None, Arc::new(MemoryMarker::default()));
        let gateway = ContractGateway::new(session, chain(), Some(public.clone()));

        let registry = gateway.registry_client().await.unwrap();
        assert_eq!(registry.address(), Address::from_low_u64_be(0x1001));
        let key = corens_core::lookup_key("bob.core").unwrap();
        assert_eq!(registry.get_record(key).await.unwrap(), taken());
        assert_eq!(public.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_signer_serves_reads_on_required_chain() {
        let wallet_contracts = MockContracts::new();
        let public = MockContracts::new();
        let wallet = MockWallet::new(
            vec![Address::from_low_u64_be(0xabc)],
            1114,
            wallet_contracts.clone(),
        );
        let session = WalletSession::new(Some(wallet), Arc::new(MemoryMarker::default()));
        session.connect().await.unwrap();
        let gateway = ContractGateway::new(session, chain(), Some(public.clone()));

        let key = corens_core::lookup_key("a.core").unwrap();
        gateway.registry_client().await.unwrap().get_record(key).await.unwrap();
        assert_eq!(wallet_contracts.lookup_count(), 1);
        assert_eq!(public.lookup_count(), 0);

        let registrar = gateway.registrar_client().await.unwrap();
        assert_eq!(registrar.account(), Address::from_low_u64_be(0xabc));
        assert_eq!(registrar.address(), Address::from_low_u64_be(0x1002));
    }

    #[tokio::test]
    async fn test_public_backend_serves_reads_on_wrong_chain() {
        let wallet_contracts = MockContracts::new();
        let public = MockContracts::new();
        let wallet = MockWallet::new(
            vec![Address::from_low_u64_be(0xabc)],
            1,
            wallet_contracts.clone(),
        );
        let session = WalletSession::new(Some(wallet), Arc::new(MemoryMarker::default()));
        session.connect().await.unwrap();
        let gateway = ContractGateway::new(session, chain(), Some(public.clone()));

        let key = corens_core::lookup_key("a.core").unwrap();
        gateway.registry_client().await.unwrap().get_record(key).await.unwrap();
        assert_eq!(public.lookup_count(), 1);
        assert_eq!(wallet_contracts.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_registrar_requires_fresh_signer_after_disconnect() {
        let wallet = MockWallet::new(
            vec![Address::from_low_u64_be(0xabc)],
            1114,
            MockContracts::new(),
        );
        let session = WalletSession::new(Some(wallet), Arc::new(MemoryMarker::default()));
        session.connect().await.unwrap();
        let gateway = ContractGateway::new(session.clone(), chain(), None);
        assert!(gateway.registrar_client().await.is_ok());

        session.disconnect().await;
        assert!(matches!(
            gateway.registrar_client().await,
            Err(Error::NotConnected)
        ));
    }
}
