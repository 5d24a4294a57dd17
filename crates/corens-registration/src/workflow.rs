//! Registration state machine
//!
//! One workflow instance backs one search box. Every check is tagged with a
//! generation number and the name it was started for; a result whose tag no
//! longer matches the live query is dropped. The `Registering` state is the
//! lock that keeps a second registration from being submitted.

use std::sync::Arc;

use corens_core::{address_hex, lookup_key, unix_now, DomainName, Error, LookupKey, Result};
use corens_session::{ContractGateway, NetworkGuard, WalletSession};
use ethers::types::H256;
use tokio::sync::{broadcast, watch, Mutex};

use crate::confirm::await_confirmation;
use crate::lookup::read_record;
use crate::{RegistrationSettings, WorkflowSnapshot, WorkflowState};

const EVENT_CAPACITY: usize = 16;

/// One-time notifications for the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// Sent once the success delay has elapsed; consumers move to the name's page
    Registered { name: String, tx_hash: H256 },
}

struct Machine {
    input: String,
    state: WorkflowState,
    /// Name the live query was started for
    query: Option<DomainName>,
    /// Bumped by every edit, check and dismissal
    generation: u64,
    last_error: Option<String>,
}

impl Machine {
    fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            input: self.input.clone(),
            state: self.state.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn reset(&mut self) {
        self.state = WorkflowState::Idle;
        self.query = None;
        self.generation += 1;
    }
}

#[derive(Clone)]
pub struct RegistrationWorkflow {
    inner: Arc<WorkflowInner>,
}

struct WorkflowInner {
    session: WalletSession,
    network: NetworkGuard,
    gateway: ContractGateway,
    settings: RegistrationSettings,
    machine: Mutex<Machine>,
    snapshot: watch::Sender<WorkflowSnapshot>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl RegistrationWorkflow {
    pub fn new(
        session: WalletSession,
        network: NetworkGuard,
        gateway: ContractGateway,
        settings: RegistrationSettings,
    ) -> Self {
        let (snapshot, _) = watch::channel(WorkflowSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(WorkflowInner {
                session,
                network,
                gateway,
                settings,
                machine: Mutex::new(Machine {
                    input: String::new(),
                    state: WorkflowState::Idle,
                    query: None,
                    generation: 0,
                    last_error: None,
                }),
                snapshot,
                events,
            }),
        }
    }

    pub fn settings(&self) -> &RegistrationSettings {
        &self.inner.settings
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.inner.events.subscribe()
    }

    pub async fn state(&self) -> WorkflowState {
        self.inner.machine.lock().await.state.clone()
    }

    fn publish(&self, machine: &Machine) {
        self.inner.snapshot.send_replace(machine.snapshot());
    }

    /// Record new search input. Any result still in flight is discarded.
    ///
    /// # Errors
    /// `RegistrationInProgress` while a registration is being processed
    pub async fn edit_input(&self, raw: &str) -> Result<WorkflowSnapshot> {
        let mut m = self.inner.machine.lock().await;
        if m.state.is_registering() {
            return Err(Error::RegistrationInProgress);
        }

        m.input = raw.to_string();
        m.last_error = None;
        m.reset();
        self.publish(&m);
        Ok(m.snapshot())
    }

    /// Check whether `raw` can be registered.
    ///
    /// Blank input is a no-op. Names that fail validation are rejected
    /// before the state changes or the Registry is read.
    ///
    /// # Errors
    /// `InvalidName`, `EncodingTooLong`, `LookupFailed`, or
    /// `RegistrationInProgress` while a registration is being processed
    pub async fn check_availability(&self, raw: &str) -> Result<WorkflowState> {
        if raw.trim().is_empty() {
            return Ok(self.state().await);
        }
        let name = DomainName::parse(raw, &self.inner.settings.suffix)?;

        let generation = {
            let mut m = self.inner.machine.lock().await;
            if m.state.is_registering() {
                return Err(Error::RegistrationInProgress);
            }
            m.generation += 1;
            m.input = raw.to_string();
            m.query = Some(name.clone());
            m.state = WorkflowState::Checking {
                name: name.to_string(),
            };
            m.last_error = None;
            self.publish(&m);
            m.generation
        };

        tracing::debug!("Checking availability of {} (key {})", name, name.key());
        let result = read_record(&self.inner.gateway, &name).await;

        let mut m = self.inner.machine.lock().await;
        if m.generation != generation || m.query.as_ref() != Some(&name) {
            tracing::debug!("Discarding stale availability result for {}", name);
            return Ok(m.state.clone());
        }

        match result {
            Ok(record) => {
                m.state = if record.is_available_at(unix_now()) {
                    WorkflowState::Available {
                        name: name.to_string(),
                    }
                } else {
                    WorkflowState::Taken {
                        name: name.to_string(),
                        owner: address_hex(&record.owner),
                        expiration: record.expiration,
                    }
                };
                tracing::info!("{} is {}", name, m.state.as_str());
                self.publish(&m);
                Ok(m.state.clone())
            }
            Err(e) => {
                tracing::warn!("{}", e);
                m.state = WorkflowState::Idle;
                m.last_error = Some(e.to_string());
                self.publish(&m);
                Err(e)
            }
        }
    }

    /// Register the name that was last found `Available`.
    ///
    /// Connects the wallet first when needed and refuses to submit on the
    /// wrong network. Returns once the transaction is confirmed. The
    /// submission keeps running if the caller stops waiting, so the state
    /// still ends in `Success` or `Failed`.
    ///
    /// # Errors
    /// `NotAvailable` outside `Available`; connection and network errors
    /// leave the state unchanged; `TransactionFailed` and
    /// `ConfirmationTimeout` move it to `Failed`.
    pub async fn register(&self) -> Result<WorkflowState> {
        let (name, generation) = {
            let m = self.inner.machine.lock().await;
            match (&m.state, &m.query) {
                (WorkflowState::Available { .. }, Some(query)) => (query.clone(), m.generation),
                (state, _) => {
                    return Err(Error::NotAvailable {
                        state: state.as_str(),
                    })
                }
            }
        };

        // Same normalized name, same key: no drift between check and submit
        let key = match lookup_key(name.as_str()) {
            Ok(key) if key == name.key() => key,
            Ok(_) => {
                return Err(Error::InvalidName {
                    name: name.to_string(),
                    reason: "lookup key changed since the availability check".to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.prepare_signer(&name).await {
            self.note_error(&e).await;
            return Err(e);
        }

        {
            let mut m = self.inner.machine.lock().await;
            let unchanged = m.generation == generation
                && m.query.as_ref() == Some(&name)
                && matches!(m.state, WorkflowState::Available { .. });
            if !unchanged {
                return Err(Error::NotAvailable {
                    state: m.state.as_str(),
                });
            }
            m.state = WorkflowState::Registering {
                name: name.to_string(),
                tx_hash: None,
            };
            m.last_error = None;
            self.publish(&m);
        }

        // Outlives the caller, so `Registering` always resolves
        let task = tokio::spawn({
            let workflow = self.clone();
            let name = name.clone();
            async move { workflow.submit_and_confirm(&name, key).await }
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                let err = Error::TransactionFailed {
                    reason: format!("registration task ended unexpectedly: {}", e),
                };
                self.finish_failed(&name, err, true).await
            }
        }
    }

    /// Submit `register(key)` and wait for its receipt
    async fn submit_and_confirm(&self, name: &DomainName, key: LookupKey) -> Result<WorkflowState> {
        let registrar = match self.inner.gateway.registrar_client().await {
            Ok(registrar) => registrar,
            Err(e) => return self.finish_failed(name, e, false).await,
        };

        let fee = self.inner.settings.fee;
        tracing::info!("Registering {} for {} wei from {}", name, fee, address_hex(&registrar.account()));
        let tx_hash = match registrar.register(key, fee).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                let err = Error::TransactionFailed {
                    reason: e.to_string(),
                };
                return self.finish_failed(name, err, false).await;
            }
        };

        {
            let mut m = self.inner.machine.lock().await;
            m.state = WorkflowState::Registering {
                name: name.to_string(),
                tx_hash: Some(tx_hash),
            };
            self.publish(&m);
        }

        let settings = &self.inner.settings;
        let confirmed = await_confirmation(
            &registrar,
            tx_hash,
            settings.confirmation_timeout,
            settings.confirmation_poll,
        )
        .await;

        match confirmed {
            Ok(receipt) if receipt.success => Ok(self.finish_success(name, tx_hash).await),
            Ok(receipt) => {
                let block = receipt
                    .block_number
                    .map(|n| format!(" in block {}", n))
                    .unwrap_or_default();
                let err = Error::TransactionFailed {
                    reason: format!("transaction {:?} reverted{}", tx_hash, block),
                };
                self.finish_failed(name, err, false).await
            }
            Err(e) => {
                let unknown = matches!(e, Error::ConfirmationTimeout { .. });
                self.finish_failed(name, e, unknown).await
            }
        }
    }

    /// Connect when needed and require the registry's chain
    async fn prepare_signer(&self, name: &DomainName) -> Result<()> {
        if !self.inner.session.is_connected().await {
            tracing::info!("Connecting wallet before registering {}", name);
            self.inner.session.connect().await?;
        }
        self.inner.network.ensure_correct_network().await
    }

    /// Return to `Idle` from any state but `Registering`
    ///
    /// # Errors
    /// `RegistrationInProgress` while a registration is being processed
    pub async fn dismiss(&self) -> Result<WorkflowSnapshot> {
        let mut m = self.inner.machine.lock().await;
        if m.state.is_registering() {
            return Err(Error::RegistrationInProgress);
        }
        m.last_error = None;
        m.reset();
        self.publish(&m);
        Ok(m.snapshot())
    }

    async fn note_error(&self, err: &Error) {
        let mut m = self.inner.machine.lock().await;
        m.last_error = Some(err.to_string());
        self.publish(&m);
    }

    async fn finish_failed(
        &self,
        name: &DomainName,
        err: Error,
        outcome_unknown: bool,
    ) -> Result<WorkflowState> {
        tracing::warn!("Registration of {} failed: {}", name, err);
        let mut m = self.inner.machine.lock().await;
        m.state = WorkflowState::Failed {
            name: name.to_string(),
            reason: err.to_string(),
            outcome_unknown,
        };
        m.last_error = Some(err.to_string());
        self.publish(&m);
        Err(err)
    }

    async fn finish_success(&self, name: &DomainName, tx_hash: H256) -> WorkflowState {
        tracing::info!("Registered {} in {:?}", name, tx_hash);
        let state = WorkflowState::Success {
            name: name.to_string(),
            tx_hash,
        };
        {
            let mut m = self.inner.machine.lock().await;
            m.state = state.clone();
            self.publish(&m);
        }

        let workflow = self.clone();
        let name = name.to_string();
        let delay = self.inner.settings.success_reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = workflow
                .inner
                .events
                .send(WorkflowEvent::Registered { name, tx_hash });

            let mut m = workflow.inner.machine.lock().await;
            let still_shown = matches!(
                &m.state,
                WorkflowState::Success { tx_hash: shown, .. } if *shown == tx_hash
            );
            if still_shown {
                m.input.clear();
                m.reset();
                workflow.publish(&m);
            }
        });

        state
    }
}
