//! Configuration types for the registry client

use std::path::{Path, PathBuf};

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::constants::{CORE_TESTNET2_CHAIN_ID, DEFAULT_REGISTRATION_FEE, DEFAULT_SUFFIX};
use crate::{ChainId, Error};

/// Native currency of the target chain (EIP-3085 shape)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Target network and the two registry contracts deployed on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// EIP-155 chain id the registry lives on
    pub chain_id: ChainId,

    /// Display name (e.g., "CoreTestnet2")
    pub name: String,

    /// Public JSON-RPC endpoint used for read-only access
    pub rpc_url: String,

    pub native_currency: NativeCurrency,

    #[serde(default)]
    pub block_explorer_url: Option<String>,

    /// Registry contract (ownership records)
    pub registry: Address,

    /// Registrar contract (paid registration)
    pub registrar: Address,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: CORE_TESTNET2_CHAIN_ID,
            name: "CoreTestnet2".to_string(),
            rpc_url: "https://rpc.test2.btcs.network".to_string(),
            native_currency: NativeCurrency {
                name: "tCORE2".to_string(),
                symbol: "tCORE2".to_string(),
                decimals: 18,
            },
            block_explorer_url: Some("https://scan.test2.btcs.network".to_string()),
            registry: Address::zero(),
            registrar: Address::zero(),
        }
    }
}

/// Wallet provider connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// EIP-1193 JSON-RPC endpoint of the user's wallet (e.g., "http://127.0.0.1:1248").
    /// Absent means no wallet provider is installed.
    #[serde(default)]
    pub provider_url: Option<String>,

    /// Directory holding the persisted "was connected" marker
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// How often the wallet is polled for account and chain changes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on a single wallet request, including user approval
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".corens")
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            provider_url: None,
            state_dir: default_state_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Registration workflow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Suffix every name must carry
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Registration fee in native units (decimal string, e.g. "1")
    #[serde(default = "default_fee")]
    pub fee: String,

    /// Bound on the wait for a registration transaction to be mined
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval while waiting for confirmation
    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,

    /// Delay between success and the redirect notification / reset
    #[serde(default = "default_success_reset_delay_ms")]
    pub success_reset_delay_ms: u64,
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

fn default_fee() -> String {
    DEFAULT_REGISTRATION_FEE.to_string()
}

fn default_confirmation_timeout_secs() -> u64 {
    180
}

fn default_confirmation_poll_ms() -> u64 {
    2_000
}

fn default_success_reset_delay_ms() -> u64 {
    2_000
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            fee: default_fee(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            confirmation_poll_ms: default_confirmation_poll_ms(),
            success_reset_delay_ms: default_success_reset_delay_ms(),
        }
    }
}

impl RegistrationConfig {
    /// Registration fee in wei
    pub fn fee_wei(&self) -> Result<U256, Error> {
        ethers::utils::parse_ether(self.fee.as_str())
            .map_err(|e| Error::Config(format!("invalid registration fee {:?}: {}", self.fee, e)))
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub registration: RegistrationConfig,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_api_port() -> u16 {
    18114
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, Error> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::Config(format!("{}: {}", path.display(), e))),
        }
    }

    /// Check that the contract addresses and fee are usable
    pub fn validate(&self) -> Result<(), Error> {
        if self.chain.registry.is_zero() {
            return Err(Error::Config("chain.registry address is not set".to_string()));
        }
        if self.chain.registrar.is_zero() {
            return Err(Error::Config("chain.registrar address is not set".to_string()));
        }
        if self.registration.suffix.is_empty() {
            return Err(Error::Config("registration.suffix must not be empty".to_string()));
        }
        self.registration.fee_wei()?;
        Ok(())
    }
}
