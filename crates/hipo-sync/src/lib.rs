//! hipo-sync: client-side sync engine for Hipo
//!
//! Keeps a local mirror of the treasury and the connected account's wallet,
//! refreshed by polling loops against an RPC endpoint, and tracks submitted
//! operations until the chain confirms them.
//!
//! - [`Store`]: the mirrored state, with change notification and memoized
//!   derived values
//! - [`PollingLoop`]: a cancellable periodic job with retry and suspend
//! - [`SnapshotJob`]: block-pinned reads applied to the store atomically
//! - [`TransactionTracker`]: signature request and confirmation polling
//! - [`Engine`]: wires the above together and exposes UI actions

pub mod context;
pub mod derived;
pub mod engine;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use context::SyncContext;
pub use derived::{Derived, StakingDetail, Timed, UnstakingDetail};
pub use engine::{Engine, EngineSnapshot, LoopStates, WalletAccount};
pub use error::SyncError;
pub use model::{
    LegacyStatus, Lifecycle, Notice, NoticeKind, PendingOperation, Snapshot, Tab, View,
    WalletSnapshot,
};
pub use scheduler::{LoopJob, LoopState, PollingLoop};
pub use snapshot::{SnapshotJob, TimesJob};
pub use store::{Change, Field, State, Store};
pub use tracker::{new_correlation_id, TransactionTracker};
