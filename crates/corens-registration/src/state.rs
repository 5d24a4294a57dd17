//! Workflow states

use corens_core::Timestamp;
use ethers::types::H256;
use serde::Serialize;

/// Registration workflow state.
///
/// `Idle -> Checking -> {Available, Taken} -> Registering -> {Success, Failed}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Checking {
        name: String,
    },
    Available {
        name: String,
    },
    Taken {
        name: String,
        /// Lowercase hex
        owner: String,
        expiration: Timestamp,
    },
    Registering {
        name: String,
        /// Set once the wallet has submitted the transaction
        tx_hash: Option<H256>,
    },
    Success {
        name: String,
        tx_hash: H256,
    },
    Failed {
        name: String,
        reason: String,
        /// The transaction may still be mined
        outcome_unknown: bool,
    },
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking { .. } => "checking",
            Self::Available { .. } => "available",
            Self::Taken { .. } => "taken",
            Self::Registering { .. } => "registering",
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_registering(&self) -> bool {
        matches!(self, Self::Registering { .. })
    }
}

/// Published view of the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowSnapshot {
    /// Raw search input as last entered
    pub input: String,
    pub state: WorkflowState,
    pub last_error: Option<String>,
}

impl Default for WorkflowSnapshot {
    fn default() -> Self {
        Self {
            input: String::new(),
            state: WorkflowState::Idle,
            last_error: None,
        }
    }
}
