//! Network guard
//!
//! Compares the wallet's active chain with the chain the registry contracts
//! are deployed on and drives the switch request. At most one switch is in
//! flight at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use corens_core::{ChainConfig, ChainId, Error, ProviderError, Result};
use evm_client::{network_name, WalletProvider};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::WalletSession;

/// Displayable network state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub is_correct_network: bool,
    pub current_chain_id: Option<ChainId>,
    pub current_network_name: Option<String>,
    pub required_chain_id: ChainId,
    pub required_network_name: String,
    pub switching: bool,
    pub last_error: Option<String>,
    /// Wrong-network warning should be shown
    pub banner_visible: bool,
}

#[derive(Clone)]
pub struct NetworkGuard {
    inner: Arc<GuardInner>,
}

struct GuardInner {
    session: WalletSession,
    chain: ChainConfig,
    switching: AtomicBool,
    last_error: RwLock<Option<String>>,
    /// Session epoch at which the banner was dismissed
    dismissed_at: RwLock<Option<u64>>,
}

/// Clears the switching flag however the switch ends
struct SwitchingReset<'a>(&'a AtomicBool);

impl Drop for SwitchingReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl NetworkGuard {
    pub fn new(session: WalletSession, chain: ChainConfig) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                session,
                chain,
                switching: AtomicBool::new(false),
                last_error: RwLock::new(None),
                dismissed_at: RwLock::new(None),
            }),
        }
    }

    pub fn required_chain_id(&self) -> ChainId {
        self.inner.chain.chain_id
    }

    pub fn is_switching(&self) -> bool {
        self.inner.switching.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> NetworkStatus {
        let session = &self.inner.session;
        let connected = session.is_connected().await;
        let current = session.chain_id().await;
        let epoch = session.epoch().await;
        let required = self.inner.chain.chain_id;
        let is_correct_network = current == Some(required);

        let current_network_name = current.and_then(|id| {
            if id == required {
                Some(self.inner.chain.name.clone())
            } else {
                network_name(id).map(str::to_string)
            }
        });
        let dismissed = *self.inner.dismissed_at.read().await == Some(epoch);

        NetworkStatus {
            is_correct_network,
            current_chain_id: current,
            current_network_name,
            required_chain_id: required,
            required_network_name: self.inner.chain.name.clone(),
            switching: self.is_switching(),
            last_error: self.inner.last_error.read().await.clone(),
            banner_visible: connected && !is_correct_network && !dismissed,
        }
    }

    /// Ask the wallet to move to the required chain.
    ///
    /// When the wallet does not know the chain it is asked to add it first.
    ///
    /// # Errors
    /// `SwitchAlreadyInProgress` while another switch is in flight,
    /// `UserRejected` when the user declines, `SwitchFailed` otherwise.
    pub async fn switch_network(&self) -> Result<NetworkStatus> {
        let Some(provider) = self.inner.session.provider() else {
            return Err(Error::ProviderUnavailable);
        };

        if self
            .inner
            .switching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::SwitchAlreadyInProgress);
        }
        let reset = SwitchingReset(&self.inner.switching);

        let required = self.inner.chain.chain_id;
        tracing::info!("Requesting switch to chain {} ({})", required, self.inner.chain.name);

        let outcome = match self.request_switch(provider.as_ref()).await {
            Ok(chain_id) if chain_id == required => Ok(chain_id),
            Ok(chain_id) => Err(Error::SwitchFailed {
                message: format!("wallet remained on chain {}", chain_id),
            }),
            Err(ProviderError::UserRejected) => Err(Error::UserRejected),
            Err(e) => Err(Error::SwitchFailed {
                message: e.to_string(),
            }),
        };

        match &outcome {
            Ok(chain_id) => {
                *self.inner.last_error.write().await = None;
                self.inner.session.set_chain_id(*chain_id).await;
                tracing::info!("Switched to chain {}", chain_id);
            }
            Err(e) => {
                *self.inner.last_error.write().await = Some(e.to_string());
                tracing::warn!("Network switch failed: {}", e);
            }
        }

        drop(reset);
        outcome?;
        Ok(self.status().await)
    }

    async fn request_switch(
        &self,
        provider: &dyn WalletProvider,
    ) -> std::result::Result<ChainId, ProviderError> {
        let chain = &self.inner.chain;
        match provider.switch_chain(chain.chain_id).await {
            Ok(()) => {}
            Err(ProviderError::UnrecognizedChain) => {
                tracing::info!("Wallet does not know chain {}; requesting it be added", chain.chain_id);
                provider.add_chain(chain).await?;
            }
            Err(e) => return Err(e),
        }
        provider.chain_id().await
    }

    /// # Errors
    /// `WrongNetwork` unless the wallet is on the required chain
    pub async fn ensure_correct_network(&self) -> Result<()> {
        let current = self.inner.session.chain_id().await;
        let required = self.inner.chain.chain_id;
        if current == Some(required) {
            Ok(())
        } else {
            Err(Error::WrongNetwork { current, required })
        }
    }

    /// Hide the wrong-network banner until the session next changes
    pub async fn dismiss_banner(&self) -> NetworkStatus {
        let epoch = self.inner.session.epoch().await;
        *self.inner.dismissed_at.write().await = Some(epoch);
        self.status().await
    }
}
