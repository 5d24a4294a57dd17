//! Application state shared across API handlers

use std::sync::Arc;

use corens_core::{AppConfig, Result};
use corens_registration::{RegistrationSettings, RegistrationWorkflow};
use corens_session::{ConnectionMarker, ContractGateway, NetworkGuard, WalletSession};
use evm_client::{ContractBackend, WalletProvider};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    session: WalletSession,
    network: NetworkGuard,
    gateway: ContractGateway,
    workflow: RegistrationWorkflow,
}

impl AppState {
    /// Wire the session, guard, gateway and workflow from one config.
    ///
    /// `provider` is the user's wallet if one is present; `public` is the
    /// read-only backend used for Registry reads without a usable wallet.
    ///
    /// # Errors
    /// `Config` when the registration settings are invalid
    pub fn new(
        config: AppConfig,
        provider: Option<Arc<dyn WalletProvider>>,
        public: Option<Arc<dyn ContractBackend>>,
        marker: Arc<dyn ConnectionMarker>,
    ) -> Result<Self> {
        let settings = RegistrationSettings::from_config(&config.registration)?;
        let session = WalletSession::new(provider, marker);
        let network = NetworkGuard::new(session.clone(), config.chain.clone());
        let gateway = ContractGateway::new(session.clone(), config.chain.clone(), public);
        let workflow =
            RegistrationWorkflow::new(session.clone(), network.clone(), gateway.clone(), settings);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                session,
                network,
                gateway,
                workflow,
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &WalletSession {
        &self.inner.session
    }

    pub fn network(&self) -> &NetworkGuard {
        &self.inner.network
    }

    pub fn gateway(&self) -> &ContractGateway {
        &self.inner.gateway
    }

    pub fn workflow(&self) -> &RegistrationWorkflow {
        &self.inner.workflow
    }
}
