//! EIP-1193 wallet reached over JSON-RPC
//!
//! Desktop wallets such as Frame expose the injected-provider API on a local
//! HTTP endpoint. Requests go straight through; change notifications are
//! derived by polling `eth_accounts` and `eth_chainId` while at least one
//! subscriber is listening. Each new subscriber gets the full current state
//! on the next poll, so a change made just before subscribing is not lost.

use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corens_core::{ChainConfig, ChainId, ProviderError, WalletConfig};
use ethers::providers::{Http, Middleware, Provider, ProviderError as RpcProviderError, RpcError};
use ethers::types::Address;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::{timed_request, ContractBackend, EthersBackend, ProviderEvent, WalletProvider};

/// Capacity of the notification channel
const EVENT_CAPACITY: usize = 32;

/// Map an `ethers` provider failure onto the wallet error taxonomy
pub(crate) fn classify_provider_error(err: &RpcProviderError) -> ProviderError {
    if let Some(resp) = err.as_error_response() {
        return classify_rpc_error(resp.code, &resp.message);
    }
    ProviderError::Transport {
        message: err.to_string(),
    }
}

/// EIP-1193 provider error codes
pub(crate) fn classify_rpc_error(code: i64, message: &str) -> ProviderError {
    match code {
        4001 | 4100 => ProviderError::UserRejected,
        4900 | 4901 => ProviderError::Disconnected,
        4902 => ProviderError::UnrecognizedChain,
        _ => ProviderError::Rpc {
            code,
            message: message.to_string(),
        },
    }
}

/// `wallet_addEthereumChain` parameters for a chain config
pub(crate) fn add_chain_params(chain: &ChainConfig) -> Value {
    let mut params = json!({
        "chainId": format!("0x{:x}", chain.chain_id),
        "chainName": chain.name,
        "nativeCurrency": {
            "name": chain.native_currency.name,
            "symbol": chain.native_currency.symbol,
            "decimals": chain.native_currency.decimals,
        },
        "rpcUrls": [chain.rpc_url],
    });
    if let Some(explorer) = &chain.block_explorer_url {
        params["blockExplorerUrls"] = json!([explorer]);
    }
    params
}

/// Wallet endpoint speaking EIP-1193 over HTTP JSON-RPC
pub struct Eip1193Wallet {
    provider: Provider<Http>,
    poller: Poller,
    request_timeout: Duration,
}

impl Eip1193Wallet {
    pub fn new(url: &str, config: &WalletConfig) -> Result<Self, ProviderError> {
        let provider = Provider::<Http>::try_from(url).map_err(|e| ProviderError::Transport {
            message: format!("{}: {}", url, e),
        })?;
        Ok(Self {
            provider,
            poller: Poller::new(Duration::from_millis(config.poll_interval_ms)),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    /// Build from config; `None` when no wallet endpoint is configured
    pub fn from_config(config: &WalletConfig) -> Result<Option<Self>, ProviderError> {
        config
            .provider_url
            .as_deref()
            .map(|url| Self::new(url, config))
            .transpose()
    }

    async fn request<R>(&self, method: &str, params: Value) -> Result<R, ProviderError>
    where
        R: Serialize + DeserializeOwned + Debug + Send,
    {
        timed_request(self.request_timeout, async {
            self.provider
                .request::<Value, R>(method, params)
                .await
                .map_err(|e| classify_provider_error(&e))
        })
        .await
    }
}

type PollResult = Result<(Vec<Address>, ChainId), ProviderError>;

async fn poll_once(provider: &Provider<Http>, limit: Duration) -> PollResult {
    let accounts = timed_request(limit, async {
        provider
            .get_accounts()
            .await
            .map_err(|e| classify_provider_error(&e))
    });
    let chain = timed_request(limit, async {
        provider
            .get_chainid()
            .await
            .map_err(|e| classify_provider_error(&e))
    });

    let (accounts, chain) = tokio::join!(accounts, chain);
    Ok((accounts?, chain?.as_u64()))
}

/// Background poll loop shared by every subscriber of one wallet.
///
/// Runs while the notification channel has receivers and stops on its own
/// once the last one is dropped.
struct Poller {
    events: broadcast::Sender<ProviderEvent>,
    running: Arc<AtomicBool>,
    /// Set by each new subscriber; the next poll reports the full state
    resync: Arc<AtomicBool>,
    interval: Duration,
}

impl Poller {
    fn new(interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            events,
            running: Arc::new(AtomicBool::new(false)),
            resync: Arc::new(AtomicBool::new(false)),
            interval,
        }
    }

    fn subscribe<F, Fut>(&self, poll: F) -> broadcast::Receiver<ProviderEvent>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = PollResult> + Send + 'static,
    {
        let rx = self.events.subscribe();
        self.resync.store(true, Ordering::SeqCst);
        if !self.running.swap(true, Ordering::SeqCst) {
            self.spawn(poll);
        }
        rx
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn<F, Fut>(&self, poll: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = PollResult> + Send + 'static,
    {
        let events = self.events.clone();
        let running = self.running.clone();
        let resync = self.resync.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut watcher = ChangeWatcher::default();
            loop {
                if events.receiver_count() == 0 {
                    running.store(false, Ordering::SeqCst);
                    // A subscriber arriving between the check and the store
                    // saw the flag still set and relies on this loop
                    if events.receiver_count() == 0 || running.swap(true, Ordering::SeqCst) {
                        break;
                    }
                }
                if resync.swap(false, Ordering::SeqCst) {
                    watcher.resync();
                }

                for event in watcher.observe(poll().await) {
                    tracing::debug!("Wallet event: {:?}", event);
                    let _ = events.send(event);
                }

                tokio::time::sleep(interval).await;
            }

            tracing::debug!("Wallet poll loop stopped (no subscribers)");
        });
    }
}

/// Consecutive failed polls before the wallet is treated as gone
const MAX_POLL_FAILURES: u32 = 3;

/// Turns successive polls into change notifications
#[derive(Debug, Default)]
struct ChangeWatcher {
    /// Last reported state; `None` until a poll succeeds after a resync
    baseline: Option<(Vec<Address>, ChainId)>,
    failures: u32,
    reported_down: bool,
}

impl ChangeWatcher {
    /// Forget the baseline so the next successful poll reports everything
    fn resync(&mut self) {
        self.baseline = None;
    }

    fn observe(&mut self, result: PollResult) -> Vec<ProviderEvent> {
        let mut out = Vec::new();

        let (accounts, chain_id) = match result {
            Ok(state) => state,
            Err(e) => {
                self.failures += 1;
                tracing::debug!("Wallet poll failed ({} in a row): {}", self.failures, e);
                let gone = matches!(e, ProviderError::Disconnected)
                    || self.failures >= MAX_POLL_FAILURES;
                if gone && !self.reported_down {
                    self.reported_down = true;
                    self.baseline = None;
                    out.push(ProviderEvent::Disconnected);
                }
                return out;
            }
        };
        self.failures = 0;
        self.reported_down = false;

        match &self.baseline {
            None => {
                out.push(ProviderEvent::AccountsChanged(accounts.clone()));
                out.push(ProviderEvent::ChainChanged(chain_id));
            }
            Some((known_accounts, known_chain)) => {
                if *known_accounts != accounts {
                    out.push(ProviderEvent::AccountsChanged(accounts.clone()));
                }
                if *known_chain != chain_id {
                    out.push(ProviderEvent::ChainChanged(chain_id));
                }
            }
        }
        self.baseline = Some((accounts, chain_id));
        out
    }
}

#[async_trait]
impl WalletProvider for Eip1193Wallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request("eth_requestAccounts", json!([]))
            .await
            .map_err(|e| match e {
                // Nothing answering on the endpoint is the same as no wallet
                ProviderError::Transport { .. } => ProviderError::Unavailable,
                other => other,
            })
    }

    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        let hex: String = self.request("eth_chainId", json!([])).await?;
        ChainId::from_str_radix(hex.trim_start_matches("0x"), 16).map_err(|e| {
            ProviderError::Rpc {
                code: -32603,
                message: format!("invalid chain id {:?}: {}", hex, e),
            }
        })
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), ProviderError> {
        let params = json!([{ "chainId": format!("0x{:x}", chain_id) }]);
        self.request::<Value>("wallet_switchEthereumChain", params)
            .await
            .map(|_| ())
    }

    async fn add_chain(&self, chain: &ChainConfig) -> Result<(), ProviderError> {
        self.request::<Value>("wallet_addEthereumChain", json!([add_chain_params(chain)]))
            .await
            .map(|_| ())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        let provider = self.provider.clone();
        let limit = self.request_timeout;
        self.poller.subscribe(move || {
            let provider = provider.clone();
            async move { poll_once(&provider, limit).await }
        })
    }

    fn signer(&self, account: Address) -> Result<Arc<dyn ContractBackend>, ProviderError> {
        let provider = self.provider.clone().with_sender(account);
        Ok(Arc::new(EthersBackend::new(provider)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_low_u64_be(n as u64)
    }

    #[test]
    fn test_rpc_error_classification() {
        assert_eq!(classify_rpc_error(4001, "denied"), ProviderError::UserRejected);
        assert_eq!(classify_rpc_error(4902, "unknown"), ProviderError::UnrecognizedChain);
        assert_eq!(classify_rpc_error(4900, "gone"), ProviderError::Disconnected);
        assert_eq!(
            classify_rpc_error(-32000, "boom"),
            ProviderError::Rpc {
                code: -32000,
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_add_chain_params() {
        let params = add_chain_params(&ChainConfig::default());
        assert_eq!(params["chainId"], "0x45a");
        assert_eq!(params["chainName"], "CoreTestnet2");
        assert_eq!(params["nativeCurrency"]["decimals"], 18);
        assert_eq!(params["rpcUrls"][0], "https://rpc.test2.btcs.network");
        assert_eq!(params["blockExplorerUrls"][0], "https://scan.test2.btcs.network");
    }

    fn full_state(accounts: Vec<Address>, chain_id: ChainId) -> Vec<ProviderEvent> {
        vec![
            ProviderEvent::AccountsChanged(accounts),
            ProviderEvent::ChainChanged(chain_id),
        ]
    }

    #[test]
    fn test_watcher_first_poll_reports_full_state() {
        let mut watcher = ChangeWatcher::default();
        assert_eq!(
            watcher.observe(Ok((vec![addr(1)], 1114))),
            full_state(vec![addr(1)], 1114)
        );
        assert!(watcher.observe(Ok((vec![addr(1)], 1114))).is_empty());
    }

    #[test]
    fn test_watcher_reports_changes() {
        let mut watcher = ChangeWatcher::default();
        watcher.observe(Ok((vec![addr(1)], 1114)));

        assert_eq!(
            watcher.observe(Ok((vec![addr(2)], 1))),
            full_state(vec![addr(2)], 1)
        );
        assert_eq!(
            watcher.observe(Ok((vec![], 1))),
            vec![ProviderEvent::AccountsChanged(vec![])]
        );
    }

    #[test]
    fn test_watcher_resync_reports_unchanged_state() {
        let mut watcher = ChangeWatcher::default();
        watcher.observe(Ok((vec![addr(1)], 56)));
        assert!(watcher.observe(Ok((vec![addr(1)], 56))).is_empty());

        watcher.resync();
        assert_eq!(
            watcher.observe(Ok((vec![addr(1)], 56))),
            full_state(vec![addr(1)], 56)
        );
    }

    #[test]
    fn test_watcher_tolerates_transient_failures() {
        let mut watcher = ChangeWatcher::default();
        watcher.observe(Ok((vec![addr(1)], 1114)));

        let timeout = || Err(ProviderError::Timeout { secs: 120 });
        for _ in 1..MAX_POLL_FAILURES {
            assert!(watcher.observe(timeout()).is_empty());
        }
        // A success resets the count
        assert!(watcher.observe(Ok((vec![addr(1)], 1114))).is_empty());
        for _ in 1..MAX_POLL_FAILURES {
            assert!(watcher.observe(timeout()).is_empty());
        }

        assert_eq!(watcher.observe(timeout()), vec![ProviderEvent::Disconnected]);
        assert!(watcher.observe(timeout()).is_empty());
    }

    #[test]
    fn test_watcher_reports_wallet_disconnect_immediately() {
        let mut watcher = ChangeWatcher::default();
        watcher.observe(Ok((vec![addr(1)], 1114)));

        assert_eq!(
            watcher.observe(Err(ProviderError::Disconnected)),
            vec![ProviderEvent::Disconnected]
        );
        assert!(watcher.observe(Err(ProviderError::Disconnected)).is_empty());

        // Coming back reports the state afresh
        assert_eq!(
            watcher.observe(Ok((vec![addr(1)], 1114))),
            full_state(vec![addr(1)], 1114)
        );
    }

    /// Scripted wallet state for the poll loop
    #[derive(Clone)]
    struct Script {
        state: Arc<std::sync::Mutex<(Vec<Address>, ChainId)>>,
        polls: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Script {
        fn new(chain_id: ChainId) -> Self {
            Self {
                state: Arc::new(std::sync::Mutex::new((vec![addr(1)], chain_id))),
                polls: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            }
        }

        fn set_chain(&self, chain_id: ChainId) {
            self.state.lock().unwrap().1 = chain_id;
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }

        fn source(&self) -> impl Fn() -> std::future::Ready<PollResult> + Send + 'static {
            let script = self.clone();
            move || {
                script.polls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok(script.state.lock().unwrap().clone()))
            }
        }
    }

    async fn next_chain(rx: &mut broadcast::Receiver<ProviderEvent>) -> ChainId {
        loop {
            if let ProviderEvent::ChainChanged(id) = rx.recv().await.unwrap() {
                return id;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_before_first_poll_is_reported() {
        let poller = Poller::new(Duration::from_secs(1));
        let script = Script::new(1114);

        // Session read 1114; the wallet moved before the first poll
        script.set_chain(56);
        let mut rx = poller.subscribe(script.source());
        assert_eq!(next_chain(&mut rx).await, 56);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_restarts_after_last_subscriber_leaves() {
        let poller = Poller::new(Duration::from_secs(1));
        let script = Script::new(1114);

        let mut first = poller.subscribe(script.source());
        assert_eq!(next_chain(&mut first).await, 1114);
        assert!(poller.is_running());
        drop(first);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!poller.is_running());
        let polls = script.polls();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(script.polls(), polls);

        let mut second = poller.subscribe(script.source());
        assert!(poller.is_running());
        assert_eq!(next_chain(&mut second).await, 1114);

        script.set_chain(1);
        assert_eq!(next_chain(&mut second).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_subscriber_gets_current_state_from_running_loop() {
        let poller = Poller::new(Duration::from_secs(1));
        let script = Script::new(1114);

        let mut first = poller.subscribe(script.source());
        assert_eq!(next_chain(&mut first).await, 1114);

        let mut second = poller.subscribe(script.source());
        assert_eq!(next_chain(&mut second).await, 1114);
        assert!(poller.is_running());
    }

    #[test]
    fn test_from_config_without_url() {
        let config = WalletConfig::default();
        assert!(Eip1193Wallet::from_config(&config).unwrap().is_none());

        let config = WalletConfig {
            provider_url: Some("http://127.0.0.1:1248".to_string()),
            ..WalletConfig::default()
        };
        assert!(Eip1193Wallet::from_config(&config).unwrap().is_some());
    }
}
