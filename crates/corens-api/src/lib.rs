//! corens-api: HTTP API layer for the registry client
//!
//! Exposes the wallet session, network status and registration workflow to
//! the frontend as a small JSON API.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::AppState;
