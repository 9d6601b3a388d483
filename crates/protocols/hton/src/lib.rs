//! Hipo Liquid Staking Protocol Implementation
//!
//! This crate implements client-side access to the Hipo liquid staking
//! protocol on TON.
//!
//! # Protocol Overview
//!
//! Users deposit TON into a shared treasury and receive hTON, a token whose
//! TON value grows as validation rewards are recovered each round:
//! - Stake: TON in, hTON minted at `total_tokens / total_coins`
//! - Unstake: hTON burned, TON paid out once the round holding it releases
//!
//! # Features
//!
//! - State parsing from treasury and wallet get methods
//! - Exchange rate, fee, APY, and release time calculations
//! - Legacy treasury balance detection and conversion
//! - Payload building for stake/unstake/migrate operations

pub mod calculator;
pub mod constants;
pub mod fetch;
pub mod legacy;
pub mod state;
pub mod tx_builder;

pub use calculator::*;
pub use constants::*;
pub use fetch::{
    fetch_balance, fetch_fees, fetch_times, fetch_treasury_state, fetch_wallet_address,
    fetch_wallet_fees, fetch_wallet_state,
};
pub use legacy::{convert_legacy, fetch_legacy_position, LegacyPosition};
pub use state::*;
pub use tx_builder::*;
