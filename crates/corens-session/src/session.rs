//! Wallet session lifecycle
//!
//! A [`WalletSession`] owns the connection to the user's wallet: the active
//! account, the signing handle built for it, the chain the wallet reports,
//! and the subscription to wallet notifications. The subscription is a
//! listener task whose `JoinHandle` the session holds; it is released on
//! `disconnect()` and replaced (never duplicated) on reconnect.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use corens_core::{address_hex, ChainId, Error, Result};
use ethers::types::Address;
use evm_client::{ContractBackend, ProviderEvent, WalletProvider};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;

use crate::ConnectionMarker;

/// Published view of the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Lowercase 0x-prefixed account
    pub address: Option<String>,
    pub connected: bool,
    pub chain_id: Option<ChainId>,
}

/// Authorizes transactions for one account. Owned by the session only.
struct SigningHandle {
    account: Address,
    backend: Arc<dyn ContractBackend>,
}

/// Signer lent to a caller for the duration of one call
pub(crate) struct LentSigner {
    pub account: Address,
    pub chain_id: Option<ChainId>,
    pub backend: Arc<dyn ContractBackend>,
}

#[derive(Default)]
struct SessionState {
    signer: Option<SigningHandle>,
    chain_id: Option<ChainId>,
    /// Bumped on every connect, account change, chain change and teardown
    epoch: u64,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            address: self.signer.as_ref().map(|s| address_hex(&s.account)),
            connected: self.signer.is_some(),
            chain_id: self.chain_id,
        }
    }
}

/// Subscription handle. `active` names the listener that owns it.
#[derive(Default)]
struct ListenerSlot {
    active: Option<u64>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
}

/// Process-wide wallet session
#[derive(Clone)]
pub struct WalletSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    provider: Option<Arc<dyn WalletProvider>>,
    marker: Arc<dyn ConnectionMarker>,
    state: RwLock<SessionState>,
    listener: Mutex<ListenerSlot>,
    snapshot: watch::Sender<SessionSnapshot>,
    connect_lock: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl WalletSession {
    /// Create an empty session. `provider` is `None` when no wallet is present.
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        marker: Arc<dyn ConnectionMarker>,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(SessionInner {
                provider,
                marker,
                state: RwLock::new(SessionState::default()),
                listener: Mutex::new(ListenerSlot::default()),
                snapshot,
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.inner.provider.is_some()
    }

    pub(crate) fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.inner.provider.clone()
    }

    /// Request account access and establish the session.
    ///
    /// # Errors
    /// `ProviderUnavailable` when no wallet is present, `UserRejected` when
    /// access is denied. On error the session keeps its prior state.
    pub async fn connect(&self) -> Result<SessionSnapshot> {
        let Some(provider) = self.provider() else {
            tracing::warn!(
                "No wallet provider found. Install MetaMask or another Ethereum wallet to connect"
            );
            return Err(Error::ProviderUnavailable);
        };

        let _connecting = self.inner.connect_lock.lock().await;

        let accounts = provider.request_accounts().await?;
        let Some(account) = accounts.first().copied() else {
            return Err(Error::UserRejected);
        };
        let chain_id = provider.chain_id().await?;
        let backend = provider.signer(account)?;

        // Subscribe before committing so no notification is missed
        let events = provider.subscribe();

        {
            let mut state = self.inner.state.write().await;
            state.signer = Some(SigningHandle { account, backend });
            state.chain_id = Some(chain_id);
            state.epoch += 1;
            self.publish(&state);
        }

        if let Err(e) = self.inner.marker.set() {
            tracing::warn!("Failed to persist connection marker: {}", e);
        }
        self.spawn_listener(events);

        tracing::info!("Wallet connected: {} on chain {}", address_hex(&account), chain_id);
        Ok(self.snapshot())
    }

    /// Clear the session, remove the marker and release the subscription.
    /// Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        if self.teardown(None).await {
            tracing::info!("Wallet disconnected");
        }
    }

    /// Reconnect silently when the previous run ended connected.
    ///
    /// Returns `None` when no reconnect was attempted or it failed.
    pub async fn restore(&self) -> Option<SessionSnapshot> {
        if !self.inner.marker.is_set() {
            return None;
        }

        tracing::info!("Restoring previous wallet session");
        match self.connect().await {
            Ok(snapshot) => Some(snapshot),
            Err(Error::UserRejected) => {
                tracing::info!("Wallet declined silent reconnect; forgetting session");
                if let Err(e) = self.inner.marker.clear() {
                    tracing::warn!("Failed to clear connection marker: {}", e);
                }
                None
            }
            Err(e) => {
                tracing::warn!("Silent reconnect failed: {}", e);
                None
            }
        }
    }

    /// Release the subscription at process exit. The marker is kept so the
    /// next start reconnects.
    pub fn shutdown(&self) {
        let mut slot = lock(&self.inner.listener);
        slot.active = None;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
            tracing::debug!("Wallet subscription released");
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.read().await.signer.is_some()
    }

    pub async fn address(&self) -> Option<Address> {
        self.inner.state.read().await.signer.as_ref().map(|s| s.account)
    }

    pub async fn chain_id(&self) -> Option<ChainId> {
        self.inner.state.read().await.chain_id
    }

    pub async fn epoch(&self) -> u64 {
        self.inner.state.read().await.epoch
    }

    pub(crate) async fn lend_signer(&self) -> Option<LentSigner> {
        let state = self.inner.state.read().await;
        state.signer.as_ref().map(|s| LentSigner {
            account: s.account,
            chain_id: state.chain_id,
            backend: s.backend.clone(),
        })
    }

    /// Record the wallet's chain and rebuild the signer against it
    pub(crate) async fn set_chain_id(&self, chain_id: ChainId) {
        let mut state = self.inner.state.write().await;
        let Some(account) = state.signer.as_ref().map(|s| s.account) else {
            return;
        };
        if state.chain_id == Some(chain_id) {
            return;
        }

        tracing::info!("Wallet chain changed: {:?} -> {}", state.chain_id, chain_id);
        state.chain_id = Some(chain_id);
        state.epoch += 1;
        self.rebuild_signer(&mut state, account);
        self.publish(&state);
    }

    async fn set_account(&self, account: Address) -> bool {
        let mut state = self.inner.state.write().await;
        match state.signer.as_ref() {
            None => return false,
            Some(signer) if signer.account == account => return true,
            Some(_) => {}
        }

        tracing::info!("Wallet account changed to {}", address_hex(&account));
        state.epoch += 1;
        let rebuilt = self.rebuild_signer(&mut state, account);
        self.publish(&state);
        rebuilt
    }

    /// Replace the signing handle with a fresh one from the provider
    fn rebuild_signer(&self, state: &mut SessionState, account: Address) -> bool {
        let Some(provider) = self.provider() else {
            return false;
        };
        match provider.signer(account) {
            Ok(backend) => {
                state.signer = Some(SigningHandle { account, backend });
                true
            }
            Err(e) => {
                tracing::warn!("Failed to rebuild signer for {}: {}", address_hex(&account), e);
                false
            }
        }
    }

    /// Clear the session. `listener` names the listener doing the teardown,
    /// which detaches itself instead of being aborted. Returns whether a
    /// session was cleared.
    async fn teardown(&self, listener: Option<u64>) -> bool {
        {
            let mut slot = lock(&self.inner.listener);
            match listener {
                // A replaced listener must not end the current session
                Some(id) if slot.active != Some(id) => return false,
                Some(_) => {
                    slot.active = None;
                    slot.handle.take();
                }
                None => {
                    slot.active = None;
                    if let Some(handle) = slot.handle.take() {
                        handle.abort();
                    }
                }
            }
        }

        let cleared = {
            let mut state = self.inner.state.write().await;
            let was_connected = state.signer.is_some() || state.chain_id.is_some();
            state.signer = None;
            state.chain_id = None;
            if was_connected {
                state.epoch += 1;
            }
            self.publish(&state);
            was_connected
        };

        if let Err(e) = self.inner.marker.clear() {
            tracing::warn!("Failed to clear connection marker: {}", e);
        }
        cleared
    }

    fn publish(&self, state: &SessionState) {
        self.inner.snapshot.send_replace(state.snapshot());
    }

    fn spawn_listener(&self, mut events: broadcast::Receiver<ProviderEvent>) {
        let (id, previous) = {
            let mut slot = lock(&self.inner.listener);
            slot.next_id += 1;
            slot.active = Some(slot.next_id);
            (slot.next_id, slot.handle.take())
        };
        if let Some(previous) = previous {
            previous.abort();
        }
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} wallet notifications", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(inner) = weak.upgrade() else { break };
                let session = WalletSession { inner };
                if !session.is_current_listener(id) {
                    break;
                }
                if !session.handle_event(id, event).await {
                    break;
                }
            }
        });

        let mut slot = lock(&self.inner.listener);
        if slot.active == Some(id) {
            slot.handle = Some(handle);
        } else {
            // Torn down while spawning
            handle.abort();
        }
    }

    fn is_current_listener(&self, id: u64) -> bool {
        lock(&self.inner.listener).active == Some(id)
    }

    /// Apply one wallet notification; returns false once the session ended
    async fn handle_event(&self, listener: u64, event: ProviderEvent) -> bool {
        tracing::debug!("Wallet notification: {:?}", event);
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first().copied() {
                Some(account) => {
                    if self.set_account(account).await {
                        return true;
                    }
                    self.teardown(Some(listener)).await;
                    false
                }
                None => {
                    tracing::info!("Wallet revoked account access");
                    self.teardown(Some(listener)).await;
                    false
                }
            },
            ProviderEvent::ChainChanged(chain_id) => {
                self.set_chain_id(chain_id).await;
                true
            }
            ProviderEvent::Disconnected => {
                tracing::info!("Wallet provider disconnected");
                self.teardown(Some(listener)).await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryMarker;
    use evm_client::mock::{MockContracts, MockWallet};
    use std::time::Duration;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn setup(marker: bool) -> (Arc<MockWallet>, Arc<MemoryMarker>, WalletSession) {
        let wallet = MockWallet::new(vec![addr(0xabc), addr(0xdef)], 1114, MockContracts::new());
        let marker = Arc::new(MemoryMarker::new(marker));
        let session = WalletSession::new(Some(wallet.clone()), marker.clone());
        (wallet, marker, session)
    }

    /// Wait until the listener has applied pending notifications
    async fn settle(session: &WalletSession, expect: impl Fn(&SessionSnapshot) -> bool) {
        let mut rx = session.watch();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| expect(s)))
            .await
            .expect("session did not settle")
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_populates_session() {
        let (_wallet, marker, session) = setup(false);
        let snapshot = session.connect().await.unwrap();

        assert!(snapshot.connected);
        assert_eq!(
            snapshot.address.as_deref(),
            Some("0x0000000000000000000000000000000000000abc")
        );
        assert_eq!(snapshot.chain_id, Some(1114));
        assert!(marker.is_set());
        assert!(session.lend_signer().await.is_some());
    }

    #[tokio::test]
    async fn test_connect_without_provider() {
        let marker = Arc::new(MemoryMarker::default());
        let session = WalletSession::new(None, marker.clone());

        assert_eq!(session.connect().await, Err(Error::ProviderUnavailable));
        assert!(!session.snapshot().connected);
        assert!(!marker.is_set());
    }

    #[tokio::test]
    async fn test_rejected_connect_leaves_prior_state() {
        let (wallet, marker, session) = setup(false);
        wallet.set_rejecting(true);

        assert_eq!(session.connect().await, Err(Error::UserRejected));
        assert_eq!(session.snapshot(), SessionSnapshot::default());
        assert!(!marker.is_set());
        assert_eq!(wallet.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (wallet, marker, session) = setup(false);
        session.connect().await.unwrap();
        assert_eq!(wallet.subscriber_count(), 1);

        session.disconnect().await;
        session.disconnect().await;

        assert_eq!(session.snapshot(), SessionSnapshot::default());
        assert!(!marker.is_set());
        assert!(session.lend_signer().await.is_none());
    }

    #[tokio::test]
    async fn test_reconnect_replaces_subscription() {
        let (wallet, _marker, session) = setup(false);
        session.connect().await.unwrap();
        session.connect().await.unwrap();
        tokio::task::yield_now().await;

        // The replaced listener is aborted, so at most one stays subscribed
        tokio::time::timeout(Duration::from_secs(5), async {
            while wallet.subscriber_count() > 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_accounts_changed_switches_address() {
        let (wallet, _marker, session) = setup(false);
        session.connect().await.unwrap();

        wallet.emit(ProviderEvent::AccountsChanged(vec![addr(0xdef)]));
        settle(&session, |s| {
            s.address.as_deref() == Some("0x0000000000000000000000000000000000000def")
        })
        .await;
        assert!(session.is_connected().await);
    }

    #[tokio::test]
    async fn test_empty_accounts_disconnects() {
        let (wallet, marker, session) = setup(false);
        session.connect().await.unwrap();

        wallet.emit(ProviderEvent::AccountsChanged(vec![]));
        settle(&session, |s| !s.connected).await;
        assert!(!marker.is_set());
    }

    #[tokio::test]
    async fn test_provider_disconnect_clears_session() {
        let (wallet, marker, session) = setup(false);
        session.connect().await.unwrap();

        wallet.emit(ProviderEvent::Disconnected);
        settle(&session, |s| !s.connected).await;
        assert!(!marker.is_set());
    }

    #[tokio::test]
    async fn test_chain_changed_bumps_epoch() {
        let (wallet, _marker, session) = setup(false);
        session.connect().await.unwrap();
        let before = session.epoch().await;

        wallet.emit(ProviderEvent::ChainChanged(1));
        settle(&session, |s| s.chain_id == Some(1)).await;
        assert!(session.epoch().await > before);
        assert_eq!(session.lend_signer().await.unwrap().chain_id, Some(1));
    }

    #[tokio::test]
    async fn test_restore_with_marker() {
        let (wallet, _marker, session) = setup(true);
        let snapshot = session.restore().await.unwrap();
        assert!(snapshot.connected);
        assert_eq!(wallet.account_requests(), 1);
    }

    #[tokio::test]
    async fn test_restore_without_marker_does_not_prompt() {
        let (wallet, _marker, session) = setup(false);
        assert!(session.restore().await.is_none());
        assert_eq!(wallet.account_requests(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_keeps_marker() {
        let (_wallet, marker, session) = setup(false);
        session.connect().await.unwrap();
        session.shutdown();
        assert!(marker.is_set());
    }
}
