//! Core type definitions for Hipo

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TON address (user-friendly base64url form or raw `workchain:hex` form)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Build a raw address from a workchain and a 32-byte account id
    pub fn from_raw(workchain: i32, account_id: &[u8; 32]) -> Self {
        Self(format!("{}:{}", workchain, hex::encode(account_id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the account id of a raw-form address
    pub fn raw_account_id(&self) -> Option<[u8; 32]> {
        let (_, hash) = self.0.split_once(':')?;
        let bytes = hex::decode(hash).ok()?;
        bytes.try_into().ok()
    }

    /// Check if this is a user-friendly address flagged as testnet-only
    pub fn is_testnet_only(&self) -> bool {
        self.0.starts_with('k') || self.0.starts_with('0') && !self.0.contains(':')
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }

    /// Chain id used by wallet bridges (`-239` mainnet, `-3` testnet)
    pub fn chain_id(&self) -> i32 {
        match self {
            Self::Mainnet => -239,
            Self::Testnet => -3,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Self::Mainnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// Masterchain block sequence number
pub type BlockHeight = u64;

/// Amount in nanoTON / nano-hTON (9 decimals)
pub type Nano = u128;

/// Unix timestamp in seconds
pub type UnixTime = u64;

/// Opaque 64-bit value echoed back by the contracts (the message `query_id`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Constants
pub mod constants {
    use super::Nano;

    /// 1 TON in nanoTON
    pub const NANO_PER_TON: Nano = 1_000_000_000;

    /// Number of fractional digits of TON and hTON
    pub const TON_DECIMALS: usize = 9;

    /// Seconds in a (non-leap) year, used for APY annualisation
    pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;
}
