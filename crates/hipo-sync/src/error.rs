//! Sync loop errors

use hipo_core::{BlockHeight, NodeError};
use thiserror::Error;

/// Why a loop iteration produced no update
#[derive(Debug, Error)]
pub enum SyncError {
    /// RPC failed or timed out; retried on the short delay and surfaced as a notice
    #[error(transparent)]
    Transient(#[from] hipo_core::Error),

    /// Result observed an older block than the one already applied
    #[error("Stale result at height {height}, cursor at {cursor}")]
    Stale {
        height: BlockHeight,
        cursor: BlockHeight,
    },

    /// Network or account changed while the read was in flight
    #[error("Result superseded by {what} change")]
    Superseded { what: &'static str },

    /// Prerequisite missing (no endpoint yet)
    #[error("Not ready: {0}")]
    NotReady(&'static str),
}

impl SyncError {
    /// Transient failures are retried early and shown to the user; the rest are silent
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<NodeError> for SyncError {
    fn from(e: NodeError) -> Self {
        Self::Transient(e.into())
    }
}
