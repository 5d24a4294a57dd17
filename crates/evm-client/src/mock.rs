//! Deterministic doubles for the wallet and contract seams
//!
//! `MockContracts` serves registry records from a fixture table and records
//! registrar submissions. `MockWallet` answers account, chain and switch
//! requests from in-memory state. Both offer `Notify` gates so tests can hold
//! a request in flight and release it at a chosen point.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use corens_core::{
    lookup_key, ChainConfig, ChainError, ChainId, LookupKey, ProviderError, RegistrationRecord,
    TxReceipt,
};
use ethers::types::{Address, H256, U256};
use tokio::sync::{broadcast, Notify};

use crate::{ContractBackend, ProviderEvent, WalletProvider};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// How submitted transactions resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Mined,
    Reverted,
    /// Never mined
    Pending,
}

/// A recorded `register` submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub registrar: Address,
    pub key: LookupKey,
    pub value: U256,
    pub tx_hash: H256,
}

pub struct MockContracts {
    records: Mutex<HashMap<LookupKey, RegistrationRecord>>,
    lookup_gates: Mutex<HashMap<LookupKey, Arc<Notify>>>,
    lookup_error: Mutex<Option<ChainError>>,
    submit_error: Mutex<Option<ChainError>>,
    receipt_mode: Mutex<ReceiptMode>,
    lookups: AtomicUsize,
    submissions: Mutex<Vec<Submission>>,
}

impl MockContracts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
            lookup_gates: Mutex::new(HashMap::new()),
            lookup_error: Mutex::new(None),
            submit_error: Mutex::new(None),
            receipt_mode: Mutex::new(ReceiptMode::Mined),
            lookups: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
        })
    }

    fn key(name: &str) -> LookupKey {
        lookup_key(name).unwrap_or_else(|e| panic!("fixture name {:?}: {}", name, e))
    }

    /// Serve `record` for the normalized `name`
    pub fn set_record(&self, name: &str, record: RegistrationRecord) {
        lock(&self.records).insert(Self::key(name), record);
    }

    /// Hold lookups of `name` until the returned gate is notified
    pub fn hold_lookup(&self, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.lookup_gates).insert(Self::key(name), gate.clone());
        gate
    }

    pub fn fail_lookups(&self, message: &str) {
        *lock(&self.lookup_error) = Some(ChainError::Call {
            message: message.to_string(),
        });
    }

    pub fn fail_submissions(&self, err: ChainError) {
        *lock(&self.submit_error) = Some(err);
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        *lock(&self.receipt_mode) = mode;
    }

    /// Number of `getRecord` calls received
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.submissions).clone()
    }
}

#[async_trait]
impl ContractBackend for MockContracts {
    async fn get_record(
        &self,
        _registry: Address,
        key: LookupKey,
    ) -> Result<RegistrationRecord, ChainError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let gate = lock(&self.lookup_gates).remove(&key);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(err) = lock(&self.lookup_error).clone() {
            return Err(err);
        }
        Ok(lock(&self.records)
            .get(&key)
            .copied()
            .unwrap_or_else(RegistrationRecord::empty))
    }

    async fn register(
        &self,
        registrar: Address,
        key: LookupKey,
        value: U256,
    ) -> Result<H256, ChainError> {
        if let Some(err) = lock(&self.submit_error).clone() {
            return Err(err);
        }

        let mut submissions = lock(&self.submissions);
        let tx_hash = H256::from_low_u64_be(submissions.len() as u64 + 1);
        submissions.push(Submission {
            registrar,
            key,
            value,
            tx_hash,
        });
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: H256) -> Result<Option<TxReceipt>, ChainError> {
        let known = lock(&self.submissions).iter().any(|s| s.tx_hash == tx_hash);
        if !known {
            return Ok(None);
        }

        let receipt = |success| TxReceipt {
            tx_hash,
            block_number: Some(1),
            success,
        };
        Ok(match *lock(&self.receipt_mode) {
            ReceiptMode::Mined => Some(receipt(true)),
            ReceiptMode::Reverted => Some(receipt(false)),
            ReceiptMode::Pending => None,
        })
    }
}

pub struct MockWallet {
    accounts: Mutex<Vec<Address>>,
    chain_id: AtomicU64,
    rejecting: AtomicBool,
    unknown_chains: Mutex<HashSet<ChainId>>,
    switch_gate: Mutex<Option<Arc<Notify>>>,
    switch_error: Mutex<Option<ProviderError>>,
    add_chain_error: Mutex<Option<ProviderError>>,
    account_requests: AtomicUsize,
    switch_requests: AtomicUsize,
    add_chain_requests: AtomicUsize,
    events: broadcast::Sender<ProviderEvent>,
    contracts: Arc<MockContracts>,
}

impl MockWallet {
    pub fn new(accounts: Vec<Address>, chain_id: ChainId, contracts: Arc<MockContracts>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            accounts: Mutex::new(accounts),
            chain_id: AtomicU64::new(chain_id),
            rejecting: AtomicBool::new(false),
            unknown_chains: Mutex::new(HashSet::new()),
            switch_gate: Mutex::new(None),
            switch_error: Mutex::new(None),
            add_chain_error: Mutex::new(None),
            account_requests: AtomicUsize::new(0),
            switch_requests: AtomicUsize::new(0),
            add_chain_requests: AtomicUsize::new(0),
            events,
            contracts,
        })
    }

    /// Deny every account request with `UserRejected`
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Treat `chain_id` as not configured in the wallet until it is added
    pub fn mark_unknown(&self, chain_id: ChainId) {
        lock(&self.unknown_chains).insert(chain_id);
    }

    /// Hold the next switch request until the returned gate is notified
    pub fn hold_switch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.switch_gate) = Some(gate.clone());
        gate
    }

    /// Fail the next switch request with `err`
    pub fn fail_switch(&self, err: ProviderError) {
        *lock(&self.switch_error) = Some(err);
    }

    pub fn fail_add_chain(&self, err: ProviderError) {
        *lock(&self.add_chain_error) = Some(err);
    }

    /// Deliver a wallet notification, updating the wallet's own state first
    pub fn emit(&self, event: ProviderEvent) {
        match &event {
            ProviderEvent::AccountsChanged(accounts) => *lock(&self.accounts) = accounts.clone(),
            ProviderEvent::ChainChanged(id) => self.chain_id.store(*id, Ordering::SeqCst),
            ProviderEvent::Disconnected => {}
        }
        let _ = self.events.send(event);
    }

    pub fn current_chain(&self) -> ChainId {
        self.chain_id.load(Ordering::SeqCst)
    }

    pub fn account_requests(&self) -> usize {
        self.account_requests.load(Ordering::SeqCst)
    }

    pub fn switch_requests(&self) -> usize {
        self.switch_requests.load(Ordering::SeqCst)
    }

    pub fn add_chain_requests(&self) -> usize {
        self.add_chain_requests.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.account_requests.fetch_add(1, Ordering::SeqCst);
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(ProviderError::UserRejected);
        }
        Ok(lock(&self.accounts).clone())
    }

    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        Ok(self.current_chain())
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), ProviderError> {
        self.switch_requests.fetch_add(1, Ordering::SeqCst);

        let gate = lock(&self.switch_gate).take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(err) = lock(&self.switch_error).take() {
            return Err(err);
        }
        if lock(&self.unknown_chains).contains(&chain_id) {
            return Err(ProviderError::UnrecognizedChain);
        }
        self.emit(ProviderEvent::ChainChanged(chain_id));
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainConfig) -> Result<(), ProviderError> {
        self.add_chain_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.add_chain_error).take() {
            return Err(err);
        }
        lock(&self.unknown_chains).remove(&chain.chain_id);
        // Wallets switch to a chain right after adding it
        self.emit(ProviderEvent::ChainChanged(chain.chain_id));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn signer(&self, _account: Address) -> Result<Arc<dyn ContractBackend>, ProviderError> {
        Ok(self.contracts.clone())
    }
}
