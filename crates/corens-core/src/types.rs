//! Core type definitions for the registry client

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

/// EIP-155 chain id
pub type ChainId = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Fixed-width on-chain record key (32 bytes, UTF-8 name right-padded with zeros)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupKey(pub [u8; 32]);

impl LookupKey {
    /// Hex form with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Decode the key back into the name it was built from
    pub fn to_name(&self) -> Option<String> {
        ethers::utils::parse_bytes32_string(&self.0)
            .ok()
            .map(|s| s.to_string())
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for LookupKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Ownership record as stored by the Registry contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    pub owner: Address,
    pub resolver: Address,
    pub registration_time: Timestamp,
    pub expiration: Timestamp,
}

impl RegistrationRecord {
    /// Record returned for a key that was never registered
    pub fn empty() -> Self {
        Self {
            owner: Address::zero(),
            resolver: Address::zero(),
            registration_time: 0,
            expiration: 0,
        }
    }

    pub fn has_owner(&self) -> bool {
        !self.owner.is_zero()
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expiration < now
    }

    /// A name is available iff it has no owner or its registration has expired
    pub fn is_available_at(&self, now: Timestamp) -> bool {
        !self.has_owner() || self.is_expired_at(now)
    }

    pub fn status_at(&self, now: Timestamp) -> RecordStatus {
        if !self.has_owner() {
            RecordStatus::Unregistered
        } else if self.is_expired_at(now) {
            RecordStatus::Expired
        } else {
            RecordStatus::Active
        }
    }
}

/// Display status of a registry record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Unregistered,
    Active,
    Expired,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mined transaction outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Lowercase 0x-prefixed hex form of an account address
pub fn address_hex(address: &Address) -> String {
    format!("{:?}", address)
}

/// Shortened address for display (0x1234...5678)
pub fn short_address(address: &Address) -> String {
    let full = address_hex(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Current unix time in seconds
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Constants
pub mod constants {
    /// Suffix every registered name carries
    pub const DEFAULT_SUFFIX: &str = ".core";

    /// Width of the on-chain lookup key in bytes
    pub const LOOKUP_KEY_BYTES: usize = 32;

    /// Registration fee in native units (1 CORE)
    pub const DEFAULT_REGISTRATION_FEE: &str = "1";

    /// Core Testnet2 chain id
    pub const CORE_TESTNET2_CHAIN_ID: u64 = 1114;
}
