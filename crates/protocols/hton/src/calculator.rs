//! Hipo Amount & Fee Calculator
//!
//! Pure math functions for amounts, exchange rates, fees, APY, and release
//! time estimates. No I/O, no async, no wall clock: anything time-dependent
//! takes `now` as an argument.
//!
//! # Units
//!
//! - TON and hTON amounts: nano units (u128), 1 TON = 1_000_000_000 nanoTON
//! - Times: unix seconds
//! - Rates and APY: f64, display only

use std::collections::BTreeMap;

use hipo_core::constants::{NANO_PER_TON, SECONDS_PER_YEAR, TON_DECIMALS};
use hipo_core::{Nano, UnixTime};
use serde::Serialize;

use crate::params;
use crate::state::{Fees, Participation, ParticipationState, Times, WalletFees};

/// Result of parsing user amount input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedAmount {
    Valid(Nano),
    Invalid,
}

impl ParsedAmount {
    pub fn nano(self) -> Option<Nano> {
        match self {
            Self::Valid(n) => Some(n),
            Self::Invalid => None,
        }
    }
}

/// Parse a decimal TON amount ("1", "1.5", ".25") into nano units.
///
/// Input is trimmed. Signs, exponents, separators, and more than nine
/// fractional digits are rejected.
pub fn parse_amount(text: &str) -> ParsedAmount {
    let text = text.trim();
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return ParsedAmount::Invalid;
    }
    if frac.len() > TON_DECIMALS {
        return ParsedAmount::Invalid;
    }
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(whole) || !digits_only(frac) {
        return ParsedAmount::Invalid;
    }

    let whole_nano = if whole.is_empty() {
        Some(0)
    } else {
        whole
            .parse::<Nano>()
            .ok()
            .and_then(|w| w.checked_mul(NANO_PER_TON))
    };
    let frac_nano = if frac.is_empty() {
        Some(0)
    } else {
        // Right-pad to nine digits: "25" -> 250_000_000
        format!("{:0<width$}", frac, width = TON_DECIMALS)
            .parse::<Nano>()
            .ok()
    };

    match (whole_nano, frac_nano) {
        (Some(w), Some(f)) => w.checked_add(f).map_or(ParsedAmount::Invalid, ParsedAmount::Valid),
        _ => ParsedAmount::Invalid,
    }
}

/// Format nano units at full precision with trailing zeros trimmed ("1.5", "0", "100")
pub fn format_amount(nano: Nano) -> String {
    let whole = nano / NANO_PER_TON;
    let frac = nano % NANO_PER_TON;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = TON_DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Format nano units for display with two decimals ("1.50")
pub fn format_display(nano: Nano) -> String {
    format!("{:.2}", nano as f64 / NANO_PER_TON as f64)
}

/// Group an integer with thousands separators ("1,234,567")
pub fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Largest amount that can be staked, leaving the deposit fee and a reserve
/// for the wallet's own storage. Never negative.
pub fn max_stakeable(ton_balance: Nano, deposit_coins_fee: Nano) -> Nano {
    ton_balance
        .saturating_sub(deposit_coins_fee)
        .saturating_sub(params::STAKE_RESERVE)
}

/// Conversion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// TON -> hTON
    Stake,
    /// hTON -> TON
    Unstake,
}

/// Exchange rate for a direction; 1.0 when either reserve is zero
pub fn exchange_rate(total_coins: Nano, total_tokens: Nano, direction: Direction) -> f64 {
    if total_coins == 0 || total_tokens == 0 {
        return 1.0;
    }
    match direction {
        Direction::Stake => total_tokens as f64 / total_coins as f64,
        Direction::Unstake => total_coins as f64 / total_tokens as f64,
    }
}

/// Amount received for `amount` at `rate`, in whole units
pub fn you_will_receive(amount: Nano, rate: f64) -> f64 {
    amount as f64 * rate / NANO_PER_TON as f64
}

/// Annualised yield from the last completed round.
///
/// The per-round yield `last_recovered / last_staked` (1.0 when unknown)
/// compounds once per two round durations.
pub fn apy(times: &Times, last_staked: Nano, last_recovered: Nano) -> f64 {
    let duration = 2 * times.round_duration();
    if duration == 0 {
        return 0.0;
    }
    let per_round = if last_staked == 0 || last_recovered == 0 {
        1.0
    } else {
        last_recovered as f64 / last_staked as f64
    };
    let compounding_frequency = SECONDS_PER_YEAR as f64 / duration as f64;
    per_round.powf(compounding_frequency) - 1.0
}

/// Governance fee as a percentage of rewards
pub fn protocol_fee_pct(governance_fee: u64) -> f64 {
    100.0 * governance_fee as f64 / params::GOVERNANCE_FEE_DENOMINATOR as f64
}

/// Value attached to a stake message
pub fn stake_message_value(amount: Nano, fees: &Fees) -> Nano {
    amount.saturating_add(fees.deposit_coins_fee)
}

/// Value attached to an unstake message. The wallet's storage fee is added
/// when the wallet holds less TON than it.
pub fn unstake_message_value(wallet_fees: Option<&WalletFees>, fees: &Fees) -> Nano {
    match wallet_fees {
        Some(wf) if wf.ton_balance < wf.storage_fee => {
            wf.unstake_tokens_fee.saturating_add(wf.storage_fee)
        }
        Some(wf) => wf.unstake_tokens_fee,
        None => fees.unstake_tokens_fee,
    }
}

/// Unstake fee shown to the user: the wallet's own fee when known
pub fn unstake_fee(wallet_fees: Option<&WalletFees>, fees: &Fees) -> Nano {
    wallet_fees.map_or(fees.unstake_tokens_fee, |wf| wf.unstake_tokens_fee)
}

/// A release time estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Eta {
    /// Estimated release time including the safety margin
    pub at: UnixTime,
    /// The estimate is already in the past; release is imminent
    pub imminent: bool,
}

impl Eta {
    pub fn new(release: UnixTime, now: UnixTime) -> Self {
        let at = release.saturating_add(params::ETA_MARGIN_SECS);
        Self {
            at,
            imminent: at < now,
        }
    }
}

/// When coins staked now are expected to be converted to hTON: the release
/// time of the latest round past `Open`.
pub fn stake_eta(participations: &BTreeMap<UnixTime, Participation>, now: UnixTime) -> Eta {
    let release = participations
        .values()
        .rev()
        .find(|p| p.state > ParticipationState::Open)
        .map_or(0, |p| p.stake_held_until);
    Eta::new(release, now)
}

/// When tokens unstaked now are expected to be paid out.
///
/// With a round in progress this is its release time. Otherwise, if the next
/// round has not been opened or its participation window is more than the
/// margin away, payout is immediate. Else the next round's release time.
pub fn unstake_eta(
    times: &Times,
    participations: &BTreeMap<UnixTime, Participation>,
    now: UnixTime,
) -> Eta {
    if let Some(current) = participations.get(&times.current_round_since) {
        return Eta::new(current.stake_held_until, now);
    }
    let next_open = participations.contains_key(&times.next_round_since);
    let window_far = now < times.participate_since.saturating_sub(params::ETA_MARGIN_SECS);
    if !next_open || window_far {
        return Eta::new(0, now);
    }
    Eta::new(
        times
            .next_round_until
            .saturating_add(times.stake_held_for)
            .saturating_add(params::ETA_MARGIN_SECS),
        now,
    )
}

/// Hours until the earliest in-flight round releases its stake (plus the
/// margin), rounded up and floored at zero.
pub fn unstake_eta_hours(
    participations: &BTreeMap<UnixTime, Participation>,
    now: UnixTime,
) -> u64 {
    let Some(release) = participations
        .values()
        .find(|p| p.state > ParticipationState::Open)
        .map(|p| p.stake_held_until.saturating_add(params::ETA_MARGIN_SECS))
    else {
        return 0;
    };
    release.saturating_sub(now).div_ceil(3_600)
}

/// Release estimate for a wallet's pending stake in a given round, if known
pub fn round_release(
    participations: &BTreeMap<UnixTime, Participation>,
    round_since: UnixTime,
    now: UnixTime,
) -> Option<Eta> {
    participations
        .get(&round_since)
        .map(|p| p.stake_held_until)
        .filter(|&until| until != 0)
        .map(|until| Eta::new(until, now))
}

/// Release estimate for a wallet's pending unstake: the first round's release
/// time once it is at least `Staked`.
pub fn unstaking_release(
    participations: &BTreeMap<UnixTime, Participation>,
    now: UnixTime,
) -> Option<Eta> {
    participations
        .values()
        .next()
        .filter(|p| p.state >= ParticipationState::Staked)
        .map(|p| Eta::new(p.stake_held_until, now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participation(state: ParticipationState, stake_held_until: UnixTime) -> Participation {
        Participation {
            state,
            size: 0,
            total_staked: 0,
            total_recovered: 0,
            stake_held_for: 0,
            stake_held_until,
        }
    }

    fn times() -> Times {
        Times {
            current_round_since: 1_000,
            participate_since: 40_000,
            participate_until: 50_000,
            next_round_since: 66_536,
            next_round_until: 132_072,
            stake_held_for: 32_768,
        }
    }

    #[test]
    fn test_parse_amount_valid() {
        assert_eq!(parse_amount("1"), ParsedAmount::Valid(1_000_000_000));
        assert_eq!(parse_amount(" 1.5 "), ParsedAmount::Valid(1_500_000_000));
        assert_eq!(parse_amount(".25"), ParsedAmount::Valid(250_000_000));
        assert_eq!(parse_amount("3."), ParsedAmount::Valid(3_000_000_000));
        assert_eq!(parse_amount("0.000000001"), ParsedAmount::Valid(1));
        assert_eq!(parse_amount("0"), ParsedAmount::Valid(0));
    }

    #[test]
    fn test_parse_amount_invalid() {
        for input in ["", "  ", ".", "abc", "1.2.3", "-1", "+1", "1e9", "1,5", "0.0000000001"] {
            assert_eq!(parse_amount(input), ParsedAmount::Invalid, "input {:?}", input);
        }
        assert_eq!(parse_amount(&"9".repeat(40)), ParsedAmount::Invalid);
    }

    #[test]
    fn test_format_amount_reparses() {
        for input in ["1", "1.5", "0.000000001", "123456.789", "0", "00.10"] {
            let nano = parse_amount(input).nano().unwrap();
            assert_eq!(parse_amount(&format_amount(nano)), ParsedAmount::Valid(nano));
        }
        assert_eq!(format_amount(1_500_000_000), "1.5");
        assert_eq!(format_amount(100_000_000_000), "100");
        assert_eq!(format_amount(1), "0.000000001");
    }

    #[test]
    fn test_format_display() {
        assert_eq!(format_display(1_500_000_000), "1.50");
        assert_eq!(format_display(0), "0.00");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(999), "999");
    }

    #[test]
    fn test_max_stakeable_never_negative() {
        assert_eq!(max_stakeable(0, 0), 0);
        assert_eq!(max_stakeable(50_000_000, 0), 0);
        assert_eq!(max_stakeable(150_000_000, 100_000_000), 0);
        assert_eq!(max_stakeable(2_000_000_000, 100_000_000), 1_800_000_000);
    }

    #[test]
    fn test_exchange_rate_symmetry() {
        for (c, t) in [(1_000u128, 900u128), (7, 13), (1_000_000_000_000, 999_999_999_999)] {
            let product = exchange_rate(c, t, Direction::Stake) * exchange_rate(c, t, Direction::Unstake);
            assert!((product - 1.0).abs() < 1e-12);
        }
        assert_eq!(exchange_rate(0, 0, Direction::Stake), 1.0);
        assert_eq!(exchange_rate(0, 5, Direction::Unstake), 1.0);
    }

    #[test]
    fn test_fresh_stake_receives_ninety() {
        let rate = exchange_rate(1_000, 900, Direction::Stake);
        assert!((rate - 0.9).abs() < 1e-12);
        let amount = parse_amount("100").nano().unwrap();
        assert!((you_will_receive(amount, rate) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_apy() {
        let t = times();
        // no yield information: zero
        assert_eq!(apy(&t, 0, 0), 0.0);
        let a = apy(&t, 1_000_000, 1_000_100);
        let expected = (1.0001f64).powf(SECONDS_PER_YEAR as f64 / (2.0 * 65_536.0)) - 1.0;
        assert!((a - expected).abs() < 1e-12);
        assert!(a > 0.0);
    }

    #[test]
    fn test_protocol_fee() {
        assert!((protocol_fee_pct(65_535) - 100.0).abs() < 1e-9);
        assert!((protocol_fee_pct(6_553) - 9.999).abs() < 0.01);
    }

    #[test]
    fn test_unstake_message_value() {
        let fees = Fees {
            deposit_coins_fee: 100,
            unstake_tokens_fee: 50,
        };
        assert_eq!(unstake_message_value(None, &fees), 50);
        let funded = WalletFees {
            unstake_tokens_fee: 30,
            storage_fee: 10,
            ton_balance: 10,
        };
        assert_eq!(unstake_message_value(Some(&funded), &fees), 30);
        let starved = WalletFees {
            ton_balance: 9,
            ..funded
        };
        assert_eq!(unstake_message_value(Some(&starved), &fees), 40);
        assert_eq!(unstake_fee(Some(&starved), &fees), 30);
        assert_eq!(stake_message_value(1_000, &fees), 1_100);
    }

    #[test]
    fn test_stake_eta_uses_latest_active_round() {
        let mut ps = BTreeMap::new();
        ps.insert(100, participation(ParticipationState::Validating, 9_000));
        ps.insert(200, participation(ParticipationState::Staked, 12_000));
        ps.insert(300, participation(ParticipationState::Open, 0));
        let eta = stake_eta(&ps, 1_000);
        assert_eq!(eta.at, 12_300);
        assert!(!eta.imminent);

        let eta = stake_eta(&BTreeMap::new(), 1_000);
        assert_eq!(eta.at, 300);
        assert!(eta.imminent);
    }

    #[test]
    fn test_unstake_eta_rules() {
        let t = times();
        let mut ps = BTreeMap::new();

        // nothing known about the next round: immediate
        assert_eq!(unstake_eta(&t, &ps, 39_000).at, 300);

        // next round open but its window is far off: immediate
        ps.insert(t.next_round_since, participation(ParticipationState::Open, 0));
        assert_eq!(unstake_eta(&t, &ps, 39_000).at, 300);

        // within the margin of the window: next round release
        let eta = unstake_eta(&t, &ps, 39_800);
        assert_eq!(eta.at, 132_072 + 32_768 + 300 + 300);

        // current round participation wins
        ps.insert(t.current_round_since, participation(ParticipationState::Staked, 70_000));
        assert_eq!(unstake_eta(&t, &ps, 39_800).at, 70_300);
    }

    #[test]
    fn test_unstake_eta_hours() {
        let mut ps = BTreeMap::new();
        assert_eq!(unstake_eta_hours(&ps, 0), 0);
        ps.insert(10, participation(ParticipationState::Open, 0));
        ps.insert(20, participation(ParticipationState::Held, 3_600));
        ps.insert(30, participation(ParticipationState::Staked, 90_000));
        // earliest in-flight round: 3_600 + 300 from 0 -> 2 hours rounded up
        assert_eq!(unstake_eta_hours(&ps, 0), 2);
        assert_eq!(unstake_eta_hours(&ps, 3_900), 0);
        assert_eq!(unstake_eta_hours(&ps, 10_000), 0);
    }

    #[test]
    fn test_round_release() {
        let mut ps = BTreeMap::new();
        ps.insert(10, participation(ParticipationState::Open, 0));
        ps.insert(20, participation(ParticipationState::Staked, 1_000));
        assert_eq!(round_release(&ps, 10, 0), None);
        assert_eq!(round_release(&ps, 20, 0).map(|e| e.at), Some(1_300));
        assert_eq!(round_release(&ps, 30, 0), None);
        // first round still open: no estimate
        assert_eq!(unstaking_release(&ps, 0), None);
        ps.remove(&10);
        assert_eq!(unstaking_release(&ps, 0).map(|e| e.at), Some(1_300));
    }
}
