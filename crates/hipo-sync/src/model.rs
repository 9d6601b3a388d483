//! Selection, lifecycle, and snapshot types shared by the store and the loops

use hipo_core::{Address, BlockHeight, CorrelationId, Nano};
use hton::{Fees, LegacyPosition, OperationKind, TreasuryState, WalletFees, WalletState};
use serde::{Deserialize, Serialize};

/// Page shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Stake,
    Reward,
    Defi,
    Referral,
}

impl View {
    /// Views that show mirrored on-chain state and need the loops running
    pub fn requires_live_data(&self) -> bool {
        matches!(self, Self::Stake | Self::Reward)
    }
}

/// Direction selected in the stake form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Stake,
    Unstake,
}

/// Transaction lifecycle
///
/// `Idle -> Signed -> Sent -> Done -> Idle`, with `Signed | Sent -> Timeout`
/// when the poll budget runs out. `Timeout` is left only by dismissal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Idle,
    Signed,
    Sent,
    Done,
    Timeout,
}

/// The operation being tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub correlation_id: CorrelationId,
    pub amount: Nano,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Endpoint unreachable or a read failed; clears before the retry
    Transient,
    /// Connected wallet is on the other network
    NetworkMismatch,
    /// Signing bridge failed
    Bridge,
}

/// Message shown to the user until it expires or is replaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

/// Legacy treasury check result for the connected account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegacyStatus {
    #[default]
    Unchecked,
    Empty,
    Found(LegacyPosition),
}

impl LegacyStatus {
    pub fn position(&self) -> Option<&LegacyPosition> {
        match self {
            Self::Found(p) => Some(p),
            _ => None,
        }
    }
}

/// Per-account part of a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSnapshot {
    pub address: Address,
    pub state: WalletState,
    /// `None` while the wallet is not deployed
    pub fees: Option<WalletFees>,
}

/// Everything one snapshot cycle read at a single block height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Network generation the cycle started under
    pub network_gen: u64,
    /// Account generation the cycle started under
    pub account_gen: u64,
    pub height: BlockHeight,
    pub treasury: TreasuryState,
    pub fees: Fees,
    /// Present when an account was connected
    pub ton_balance: Option<Nano>,
    pub wallet: Option<WalletSnapshot>,
}
