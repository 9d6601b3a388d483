//! Values computed from the store
//!
//! [`Derived`] is a pure function of stored fields and is memoized by the
//! store. [`Timed`] also depends on the current time and is computed on
//! demand with `now` passed in.

use hipo_core::constants::NANO_PER_TON;
use hipo_core::{Nano, UnixTime};
use hton::{
    apy, exchange_rate, format_display, group_thousands, max_stakeable,
    parse_amount, protocol_fee_pct, round_release, stake_eta, unstake_eta, unstake_eta_hours,
    unstake_fee, unstaking_release, you_will_receive, Direction, Eta,
};
use serde::Serialize;

use crate::model::Tab;
use crate::store::State;

/// Display values derived from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Derived {
    pub is_wallet_connected: bool,
    pub is_stake_tab_active: bool,
    pub ton_balance: Option<String>,
    pub hton_balance: Option<String>,
    pub hton_balance_in_ton: Option<String>,
    pub staking_in_progress: String,
    pub unstaking_in_progress: String,
    pub max_amount: Nano,
    pub amount_in_nano: Option<Nano>,
    pub is_amount_valid: bool,
    pub is_amount_positive: bool,
    pub is_button_enabled: bool,
    pub button_label: &'static str,
    pub exchange_rate: Option<f64>,
    pub you_will_receive: Option<String>,
    pub exchange_rate_formatted: Option<String>,
    pub stake_fee: Option<String>,
    pub unstake_fee: Option<String>,
    pub apy: Option<f64>,
    pub apy_formatted: Option<String>,
    pub protocol_fee: Option<String>,
    pub currently_staked: Option<String>,
    pub explorer_href: String,
    pub legacy_balance: Option<String>,
    pub legacy_converted: Option<String>,
}

impl Derived {
    pub fn compute(state: &State) -> Self {
        let is_wallet_connected = state.account.is_some();
        let is_stake_tab_active = state.active_tab == Tab::Stake;
        let tokens = state.wallet_state.as_ref().map(|w| w.tokens);
        let treasury = state.treasury_state.as_ref();

        let max_amount = if is_stake_tab_active {
            max_stakeable(
                state.ton_balance.unwrap_or(0),
                state.fees.map_or(0, |f| f.deposit_coins_fee),
            )
        } else {
            tokens.unwrap_or(0)
        };

        let amount_in_nano = parse_amount(&state.amount).nano();
        let is_amount_valid = amount_in_nano
            .is_some_and(|n| state.ton_balance.is_none() || n <= max_amount);
        let is_amount_positive = amount_in_nano.is_some_and(|n| n > 0);

        let have_balance = if is_stake_tab_active {
            state.ton_balance.is_some()
        } else {
            tokens.is_some()
        };
        let is_button_enabled = if is_wallet_connected {
            is_amount_valid && is_amount_positive && have_balance
        } else {
            true
        };
        let button_label = match (is_wallet_connected, state.active_tab) {
            (false, _) => "Connect Wallet",
            (true, Tab::Stake) => "Stake",
            (true, Tab::Unstake) => "Unstake",
        };

        let direction = if is_stake_tab_active {
            Direction::Stake
        } else {
            Direction::Unstake
        };
        let rate = treasury.map(|t| exchange_rate(t.total_coins, t.total_tokens, direction));
        let unstake_rate =
            treasury.map(|t| exchange_rate(t.total_coins, t.total_tokens, Direction::Unstake));
        let receive_unit = if is_stake_tab_active { "hTON" } else { "TON" };
        let you_will_receive = rate.map(|rate| match amount_in_nano {
            Some(n) if is_amount_valid && is_amount_positive => {
                format!("~ {:.4} {}", you_will_receive(n, rate), receive_unit)
            }
            _ => receive_unit.to_string(),
        });

        let apy = state
            .times
            .as_ref()
            .zip(treasury)
            .map(|(times, t)| apy(times, t.last_staked, t.last_recovered));

        let legacy = state.legacy.position();

        Self {
            is_wallet_connected,
            is_stake_tab_active,
            ton_balance: state.ton_balance.map(|b| format!("{} TON", format_display(b))),
            hton_balance: state
                .ton_balance
                .map(|_| format!("{} hTON", format_display(tokens.unwrap_or(0)))),
            hton_balance_in_ton: tokens.zip(unstake_rate).map(|(tokens, rate)| {
                format!("{:.2} TON", hton::you_will_receive(tokens, rate))
            }),
            staking_in_progress: format!(
                "{} TON",
                format_display(state.wallet_state.as_ref().map_or(0, |w| w.staking_total()))
            ),
            unstaking_in_progress: format!(
                "{} hTON",
                format_display(state.wallet_state.as_ref().map_or(0, |w| w.unstaking))
            ),
            max_amount,
            amount_in_nano,
            is_amount_valid,
            is_amount_positive,
            is_button_enabled,
            button_label,
            exchange_rate: rate,
            you_will_receive,
            exchange_rate_formatted: unstake_rate.map(|r| format!("1 hTON = ~ {:.4} TON", r)),
            stake_fee: state
                .fees
                .map(|f| format!("{} TON", format_display(f.deposit_coins_fee))),
            unstake_fee: state.fees.as_ref().map(|f| {
                format!(
                    "{} TON",
                    format_display(unstake_fee(state.wallet_fees.as_ref(), f))
                )
            }),
            apy,
            apy_formatted: apy.map(|a| format!("{:.2}%", a * 100.0)),
            protocol_fee: treasury.map(|t| format!("{:.2}%", protocol_fee_pct(t.governance_fee))),
            currently_staked: treasury
                .map(|t| format!("{} TON", group_thousands(t.total_coins / NANO_PER_TON))),
            explorer_href: state.contracts.explorer_href(state.network),
            legacy_balance: legacy.map(|p| format!("{} hTON", format_display(p.balance))),
            legacy_converted: legacy.map(|p| format!("{} hTON", format_display(p.converted))),
        }
    }
}

/// Pending stake in one round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakingDetail {
    pub round_since: UnixTime,
    pub amount: String,
    pub eta: Option<Eta>,
}

/// Pending unstake
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnstakingDetail {
    pub amount: String,
    pub eta: Option<Eta>,
}

/// Time-dependent display values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timed {
    pub now: UnixTime,
    pub stake_eta: Option<Eta>,
    pub unstake_eta: Option<Eta>,
    pub unstake_eta_hours: Option<u64>,
    pub staking_details: Vec<StakingDetail>,
    pub unstaking_details: Option<UnstakingDetail>,
}

impl Timed {
    pub fn compute(state: &State, now: UnixTime) -> Self {
        let participations = state.treasury_state.as_ref().map(|t| &t.participations);
        let times = state.times.as_ref();

        let staking_details = state
            .wallet_state
            .as_ref()
            .map(|w| {
                w.staking
                    .iter()
                    .map(|(&round_since, &amount)| StakingDetail {
                        round_since,
                        amount: format!("{} TON", format_display(amount)),
                        eta: participations.and_then(|p| round_release(p, round_since, now)),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let unstaking_details = state
            .wallet_state
            .as_ref()
            .filter(|w| w.unstaking > 0)
            .zip(participations)
            .map(|(w, p)| UnstakingDetail {
                amount: format!("{} hTON", format_display(w.unstaking)),
                eta: unstaking_release(p, now),
            });

        Self {
            now,
            stake_eta: times.and(participations).map(|p| stake_eta(p, now)),
            unstake_eta: times
                .zip(participations)
                .map(|(t, p)| unstake_eta(t, p, now)),
            unstake_eta_hours: participations.map(|p| unstake_eta_hours(p, now)),
            staking_details,
            unstaking_details,
        }
    }
}
