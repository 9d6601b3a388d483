//! Hipo State Parsing
//!
//! Parses treasury, wallet, and round timing state from get-method stacks.

use std::collections::BTreeMap;

use hipo_core::{Address, Nano, NodeError, ProtocolError, UnixTime};
use serde::{Deserialize, Serialize};
use ton_client::{StackReader, StackValue};

use crate::params;

/// Round participation lifecycle, in on-chain order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationState {
    Open,
    Distributing,
    Staked,
    Validating,
    Held,
    Recovering,
    Burning,
}

impl ParticipationState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Open),
            1 => Some(Self::Distributing),
            2 => Some(Self::Staked),
            3 => Some(Self::Validating),
            4 => Some(Self::Held),
            5 => Some(Self::Recovering),
            6 => Some(Self::Burning),
            _ => None,
        }
    }
}

/// One staking round, keyed by its start time in [`TreasuryState::participations`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub state: ParticipationState,
    pub size: u64,
    pub total_staked: Nano,
    pub total_recovered: Nano,
    pub stake_held_for: u64,
    pub stake_held_until: UnixTime,
}

impl Participation {
    fn read(reader: &mut StackReader) -> Result<Self, NodeError> {
        let raw_state = reader.read_u64()?;
        let state = u8::try_from(raw_state)
            .ok()
            .and_then(ParticipationState::from_u8)
            .ok_or_else(|| {
                NodeError::ParseError(format!("unknown participation state {}", raw_state))
            })?;
        Ok(Self {
            state,
            size: reader.read_u64()?,
            total_staked: reader.read_u128()?,
            total_recovered: reader.read_u128()?,
            stake_held_for: reader.read_u64()?,
            stake_held_until: reader.read_u64()?,
        })
    }
}

/// Shared pool state (`get_treasury_state`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryState {
    pub total_coins: Nano,
    pub total_tokens: Nano,
    pub total_staking: Nano,
    pub total_unstaking: Nano,
    pub total_borrowers_stake: Nano,
    /// Upstream contract that derives wallet addresses, when set
    pub parent: Option<Address>,
    pub participations: BTreeMap<UnixTime, Participation>,
    pub rounds_imbalance: u64,
    pub stopped: bool,
    pub instant_mint: bool,
    pub last_staked: Nano,
    pub last_recovered: Nano,
    pub governance_fee: u64,
}

impl TreasuryState {
    pub const METHOD: &'static str = "get_treasury_state";

    pub fn from_stack(mut reader: StackReader) -> Result<Self, ProtocolError> {
        Self::read(&mut reader).map_err(|e| stack_error(Self::METHOD, e))
    }

    fn read(reader: &mut StackReader) -> Result<Self, NodeError> {
        let total_coins = reader.read_u128()?;
        let total_tokens = reader.read_u128()?;
        let total_staking = reader.read_u128()?;
        let total_unstaking = reader.read_u128()?;
        let total_borrowers_stake = reader.read_u128()?;
        let parent = reader.read_address_opt()?;

        let mut participations = BTreeMap::new();
        for (round_since, value) in reader.read_dict_opt()? {
            let StackValue::Tuple(fields) = value else {
                return Err(NodeError::ParseError(format!(
                    "participation {} is not a tuple",
                    round_since
                )));
            };
            let mut entry = StackReader::new(reader.method(), fields);
            participations.insert(round_since, Participation::read(&mut entry)?);
        }

        let rounds_imbalance = reader.read_u64()?;
        let stopped = reader.read_bool()?;
        let instant_mint = reader.read_bool()?;
        reader.skip()?; // loan codes
        let last_staked = reader.read_u128()?;
        let last_recovered = reader.read_u128()?;
        reader.skip()?; // halter
        reader.skip()?; // governor
        reader.skip()?; // proposed governor
        let governance_fee = reader.read_u64()?;

        Ok(Self {
            total_coins,
            total_tokens,
            total_staking,
            total_unstaking,
            total_borrowers_stake,
            parent,
            participations,
            rounds_imbalance,
            stopped,
            instant_mint,
            last_staked,
            last_recovered,
            governance_fee,
        })
    }

    /// Contract to ask for a user's wallet address
    pub fn wallet_resolver<'a>(&'a self, treasury: &'a Address) -> &'a Address {
        self.parent.as_ref().unwrap_or(treasury)
    }
}

/// Round timing (`get_times`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Times {
    pub current_round_since: UnixTime,
    pub participate_since: UnixTime,
    pub participate_until: UnixTime,
    pub next_round_since: UnixTime,
    pub next_round_until: UnixTime,
    pub stake_held_for: u64,
}

impl Times {
    pub const METHOD: &'static str = "get_times";

    pub fn from_stack(mut reader: StackReader) -> Result<Self, ProtocolError> {
        let mut read = || -> Result<Self, NodeError> {
            Ok(Self {
                current_round_since: reader.read_u64()?,
                participate_since: reader.read_u64()?,
                participate_until: reader.read_u64()?,
                next_round_since: reader.read_u64()?,
                next_round_until: reader.read_u64()?,
                stake_held_for: reader.read_u64()?,
            })
        };
        read().map_err(|e| stack_error(Self::METHOD, e))
    }

    /// Seconds between the starts of two consecutive rounds
    pub fn round_duration(&self) -> u64 {
        self.next_round_since.saturating_sub(self.current_round_since)
    }
}

/// Treasury operation fees (`get_fees`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    pub deposit_coins_fee: Nano,
    pub unstake_tokens_fee: Nano,
}

impl Fees {
    pub const METHOD: &'static str = "get_fees";

    pub fn from_stack(mut reader: StackReader) -> Result<Self, ProtocolError> {
        let mut read = || -> Result<Self, NodeError> {
            Ok(Self {
                deposit_coins_fee: reader.read_u128()?,
                unstake_tokens_fee: reader.read_u128()?,
            })
        };
        read().map_err(|e| stack_error(Self::METHOD, e))
    }
}

/// Per-wallet fees (`get_wallet_fees`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFees {
    pub unstake_tokens_fee: Nano,
    pub storage_fee: Nano,
    /// TON held by the wallet contract itself
    pub ton_balance: Nano,
}

impl WalletFees {
    pub const METHOD: &'static str = "get_wallet_fees";

    pub fn from_stack(mut reader: StackReader) -> Result<Self, ProtocolError> {
        let mut read = || -> Result<Self, NodeError> {
            Ok(Self {
                unstake_tokens_fee: reader.read_u128()?,
                storage_fee: reader.read_u128()?,
                ton_balance: reader.read_u128()?,
            })
        };
        read().map_err(|e| stack_error(Self::METHOD, e))
    }

    /// Fees assumed for wallet code that has no `get_wallet_fees`
    pub fn legacy() -> Self {
        Self {
            unstake_tokens_fee: params::LEGACY_UNSTAKE_TOKENS_FEE,
            storage_fee: params::LEGACY_STORAGE_FEE,
            ton_balance: 0,
        }
    }
}

/// Per-user hTON wallet state (`get_wallet_state`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    pub tokens: Nano,
    /// Coins in the staking pipeline, keyed by round start
    pub staking: BTreeMap<UnixTime, Nano>,
    pub unstaking: Nano,
}

impl WalletState {
    pub const METHOD: &'static str = "get_wallet_state";

    /// State of a wallet that is not deployed yet
    pub fn zero() -> Self {
        Self::default()
    }

    /// No tokens and nothing in flight; also how an undeployed wallet reads
    pub fn is_empty(&self) -> bool {
        self.tokens == 0 && self.staking.is_empty() && self.unstaking == 0
    }

    pub fn from_stack(mut reader: StackReader) -> Result<Self, ProtocolError> {
        let mut read = || -> Result<Self, NodeError> {
            let tokens = reader.read_u128()?;
            let mut staking = BTreeMap::new();
            for (round_since, value) in reader.read_dict_opt()? {
                let StackValue::Int(amount) = value else {
                    return Err(NodeError::ParseError(format!(
                        "staking entry {} is not an int",
                        round_since
                    )));
                };
                let amount = Nano::try_from(amount).map_err(|_| {
                    NodeError::ParseError(format!("negative staking entry {}", round_since))
                })?;
                staking.insert(round_since, amount);
            }
            let unstaking = reader.read_u128()?;
            Ok(Self {
                tokens,
                staking,
                unstaking,
            })
        };
        read().map_err(|e| stack_error(Self::METHOD, e))
    }

    pub fn staking_total(&self) -> Nano {
        self.staking.values().sum()
    }
}

fn stack_error(method: &str, err: NodeError) -> ProtocolError {
    ProtocolError::StackParseError {
        method: method.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn participation_tuple(state: u8, stake_held_until: UnixTime) -> StackValue {
        StackValue::Tuple(vec![
            StackValue::Int(state as i128),
            StackValue::Int(10),
            StackValue::Int(0),
            StackValue::Int(0),
            StackValue::Int(65_536),
            StackValue::Int(stake_held_until as i128),
        ])
    }

    pub(crate) fn treasury_stack(
        total_coins: i128,
        total_tokens: i128,
        participations: Vec<(u64, StackValue)>,
    ) -> Vec<StackValue> {
        let dict = if participations.is_empty() {
            StackValue::Null
        } else {
            StackValue::Dict(participations.into_iter().collect())
        };
        vec![
            StackValue::Int(total_coins),
            StackValue::Int(total_tokens),
            StackValue::Int(0),
            StackValue::Int(0),
            StackValue::Int(0),
            StackValue::Null,
            dict,
            StackValue::Int(0),
            StackValue::Int(0),
            StackValue::Int(-1),
            StackValue::Cell(vec![]),
            StackValue::Int(1_000),
            StackValue::Int(1_010),
            StackValue::Address(Address::new("EQhalter")),
            StackValue::Address(Address::new("EQgovernor")),
            StackValue::Null,
            StackValue::Int(4_096),
            StackValue::Cell(vec![]),
            StackValue::Cell(vec![]),
            StackValue::Null,
        ]
    }

    #[test]
    fn test_participation_state_order() {
        assert!(ParticipationState::Open < ParticipationState::Distributing);
        assert!(ParticipationState::Staked < ParticipationState::Burning);
        assert_eq!(ParticipationState::from_u8(4), Some(ParticipationState::Held));
        assert_eq!(ParticipationState::from_u8(7), None);
    }

    #[test]
    fn test_parse_treasury_state() {
        let stack = treasury_stack(
            1_000,
            900,
            vec![(100, participation_tuple(2, 5_000)), (200, participation_tuple(0, 0))],
        );
        let state = TreasuryState::from_stack(StackReader::new(TreasuryState::METHOD, stack)).unwrap();
        assert_eq!(state.total_coins, 1_000);
        assert_eq!(state.total_tokens, 900);
        assert!(state.parent.is_none());
        assert!(!state.stopped);
        assert!(state.instant_mint);
        assert_eq!(state.last_staked, 1_000);
        assert_eq!(state.last_recovered, 1_010);
        assert_eq!(state.governance_fee, 4_096);
        assert_eq!(state.participations.len(), 2);
        assert_eq!(state.participations[&100].state, ParticipationState::Staked);
        assert_eq!(state.participations[&100].stake_held_until, 5_000);
    }

    #[test]
    fn test_wallet_resolver_prefers_parent() {
        let treasury = Address::new("EQtreasury");
        let mut stack = treasury_stack(1, 1, vec![]);
        stack[5] = StackValue::Address(Address::new("EQparent"));
        let state = TreasuryState::from_stack(StackReader::new(TreasuryState::METHOD, stack)).unwrap();
        assert_eq!(state.wallet_resolver(&treasury).as_str(), "EQparent");

        let state = TreasuryState::from_stack(StackReader::new(
            TreasuryState::METHOD,
            treasury_stack(1, 1, vec![]),
        ))
        .unwrap();
        assert_eq!(state.wallet_resolver(&treasury).as_str(), "EQtreasury");
    }

    #[test]
    fn test_truncated_treasury_stack() {
        let mut stack = treasury_stack(1, 1, vec![]);
        stack.truncate(8);
        let err = TreasuryState::from_stack(StackReader::new(TreasuryState::METHOD, stack)).unwrap_err();
        assert_eq!(err.error_code(), "stack_parse_error");
    }

    #[test]
    fn test_parse_wallet_state() {
        let stack = vec![
            StackValue::Int(90),
            StackValue::Dict([(100, StackValue::Int(5)), (200, StackValue::Int(7))].into()),
            StackValue::Int(3),
        ];
        let state = WalletState::from_stack(StackReader::new(WalletState::METHOD, stack)).unwrap();
        assert_eq!(state.tokens, 90);
        assert_eq!(state.staking_total(), 12);
        assert_eq!(state.unstaking, 3);
        assert!(!state.is_empty());
        assert!(WalletState::zero().is_empty());
    }

    #[test]
    fn test_parse_times() {
        let stack = (1..=6).map(|v| StackValue::Int(v * 100)).collect();
        let times = Times::from_stack(StackReader::new(Times::METHOD, stack)).unwrap();
        assert_eq!(times.current_round_since, 100);
        assert_eq!(times.next_round_since, 400);
        assert_eq!(times.round_duration(), 300);
    }

    #[test]
    fn test_legacy_wallet_fees() {
        let fees = WalletFees::legacy();
        assert_eq!(fees.unstake_tokens_fee, 135_000_000);
        assert_eq!(fees.storage_fee, 40_000_000);
        assert_eq!(fees.ton_balance, 0);
    }
}
