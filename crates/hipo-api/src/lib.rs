//! hipo-api: HTTP API layer for the Hipo sync engine
//!
//! Exposes the engine's read-only snapshot and its action entry points to a
//! UI over HTTP.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::AppState;
