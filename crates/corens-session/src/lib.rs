//! corens-session: Wallet session lifecycle and chain-state reconciliation
//!
//! [`WalletSession`] is the single process-wide connection to the user's
//! wallet. [`NetworkGuard`] compares the wallet's chain with the one the
//! registry lives on, and [`ContractGateway`] hands out short-lived registry
//! and registrar clients built from the session's current signer.

pub mod gateway;
pub mod marker;
pub mod network;
pub mod session;

pub use gateway::{ContractGateway, RegistrarClient, RegistryClient};
pub use marker::{ConnectionMarker, FileMarker, MemoryMarker};
pub use network::{NetworkGuard, NetworkStatus};
pub use session::{SessionSnapshot, WalletSession};
