//! Data Transfer Objects for API requests and responses

use corens_core::ChainId;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub chain_id: ChainId,
    pub wallet_provider: bool,
}

impl HealthResponse {
    pub fn new(chain_id: ChainId, wallet_provider: bool) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            chain_id,
            wallet_provider,
        }
    }
}

/// Wallet session response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub connected: bool,
    /// Lowercase 0x-prefixed account
    pub address: Option<String>,
    /// Shortened account for display (0x1234...5678)
    pub short_address: Option<String>,
    pub chain_id: Option<ChainId>,
    pub provider_available: bool,
}

/// Search input request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchInputRequest {
    pub input: String,
}

/// Availability check request; without `input` the current search input is checked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub input: Option<String>,
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&corens_core::Error> for ApiError {
    fn from(err: &corens_core::Error) -> Self {
        Self::new(err.error_code(), err.to_string())
    }
}
