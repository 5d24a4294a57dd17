//! Error types for the registry client

use ethers::types::H256;
use thiserror::Error;

use crate::ChainId;

/// Errors surfaced by session, network and registration operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("No wallet provider available. Please install MetaMask or another Ethereum wallet")]
    ProviderUnavailable,

    #[error("Request rejected in the wallet")]
    UserRejected,

    #[error("Wrong network: wallet is on {}, registry requires chain {required}", display_chain(.current))]
    WrongNetwork {
        current: Option<ChainId>,
        required: ChainId,
    },

    #[error("A network switch is already in progress")]
    SwitchAlreadyInProgress,

    #[error("Network switch failed: {message}")]
    SwitchFailed { message: String },

    #[error("Invalid name {name}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Name {name} is {len} bytes, lookup keys hold at most {max}")]
    EncodingTooLong {
        name: String,
        len: usize,
        max: usize,
    },

    #[error("Lookup of {name} failed: {reason}")]
    LookupFailed { name: String, reason: String },

    #[error("Registration not possible while {state}")]
    NotAvailable { state: &'static str },

    #[error("Wallet not connected")]
    NotConnected,

    #[error("A registration is already being processed")]
    RegistrationInProgress,

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Transaction {tx_hash:?} not confirmed within {secs}s; its outcome is unknown, check again later")]
    ConfirmationTimeout { tx_hash: H256, secs: u64 },

    #[error("Wallet provider error: {0}")]
    Provider(ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn display_chain(chain: &Option<ChainId>) -> String {
    chain
        .map(|id| format!("chain {}", id))
        .unwrap_or_else(|| "an unknown chain".to_string())
}

/// Failures at the wallet provider boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Wallet provider unavailable")]
    Unavailable,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Requested chain is not configured in the wallet")]
    UnrecognizedChain,

    #[error("Wallet disconnected from all chains")]
    Disconnected,

    #[error("Wallet request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },
}

/// Contract call, submission and receipt failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Contract call failed: {message}")]
    Call { message: String },

    #[error("Transaction submission failed: {0}")]
    Submission(ProviderError),

    #[error("Receipt query failed: {message}")]
    Receipt { message: String },
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable => Self::ProviderUnavailable,
            ProviderError::UserRejected => Self::UserRejected,
            other => Self::Provider(other),
        }
    }
}

/// Result type alias for registry client operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::UserRejected => "user_rejected",
            Self::WrongNetwork { .. } => "wrong_network",
            Self::SwitchAlreadyInProgress => "switch_already_in_progress",
            Self::SwitchFailed { .. } => "switch_failed",
            Self::InvalidName { .. } => "invalid_name",
            Self::EncodingTooLong { .. } => "encoding_too_long",
            Self::LookupFailed { .. } => "lookup_failed",
            Self::NotAvailable { .. } => "not_available",
            Self::NotConnected => "not_connected",
            Self::RegistrationInProgress => "registration_in_progress",
            Self::TransactionFailed { .. } => "transaction_failed",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::Provider(_) => "provider_error",
            Self::Config(_) => "config_error",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidName { .. } | Self::EncodingTooLong { .. } => 400,
            Self::NotConnected => 401,
            Self::UserRejected => 403,
            Self::SwitchAlreadyInProgress
            | Self::NotAvailable { .. }
            | Self::RegistrationInProgress => 409,
            Self::WrongNetwork { .. } | Self::TransactionFailed { .. } => 422,
            Self::LookupFailed { .. } | Self::SwitchFailed { .. } | Self::Provider(_) => 502,
            Self::ProviderUnavailable => 503,
            Self::ConfirmationTimeout { .. } => 504,
            Self::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = Error::EncodingTooLong {
            name: "x".into(),
            len: 40,
            max: 32,
        };
        assert_eq!(err.error_code(), "encoding_too_long");
        assert_eq!(err.status_code(), 400);

        let err = Error::NotAvailable { state: "idle" };
        assert_eq!(err.error_code(), "not_available");
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_provider_error_conversion() {
        assert_eq!(Error::from(ProviderError::Unavailable), Error::ProviderUnavailable);
        assert_eq!(Error::from(ProviderError::UserRejected), Error::UserRejected);
        assert!(matches!(
            Error::from(ProviderError::Timeout { secs: 5 }),
            Error::Provider(ProviderError::Timeout { secs: 5 })
        ));
    }

    #[test]
    fn test_timeout_message_says_outcome_unknown() {
        let err = Error::ConfirmationTimeout {
            tx_hash: H256::zero(),
            secs: 120,
        };
        let msg = err.to_string();
        assert!(msg.contains("unknown"));
        assert!(msg.contains("check again later"));
    }

    #[test]
    fn test_wrong_network_message() {
        let err = Error::WrongNetwork {
            current: Some(1),
            required: 1114,
        };
        assert_eq!(
            err.to_string(),
            "Wrong network: wallet is on chain 1, registry requires chain 1114"
        );
    }
}
