//! corens-core: Shared types, errors, and configuration
//!
//! This crate provides the foundational types used across the corens workspace.

pub mod config;
pub mod errors;
pub mod name;
pub mod types;

pub use config::*;
pub use errors::*;
pub use name::*;
pub use types::*;
