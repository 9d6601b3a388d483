//! Hipo Transaction Builder
//!
//! Builds the single-message transfers for stake, unstake, and legacy
//! migration operations.
//!
//! # Payload layout
//!
//! `opcode: u32 BE | query_id: u64 BE | body`. The query id carries the
//! operation's correlation id; the contracts echo it back in every message
//! they send as a result, which is how confirmation is detected.
//!
//! - stake body: referrer as `tag: u8` (0 none, 1 present) then `workchain: i8 | account: [u8; 32]`
//! - unstake body: token amount as u128 BE
//! - migrate body: token amount as u128 BE

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use hipo_core::{
    Address, CorrelationId, Error, Nano, Network, ProtocolError, TxError, UnixTime,
};
use serde::Serialize;
use ton_client::{MessageHeader, SignRequest};

use crate::calculator::{max_stakeable, stake_message_value, unstake_message_value};
use crate::state::{Fees, TreasuryState, WalletFees};
use crate::{op, params};

/// Hipo operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Stake,
    Unstake,
    Migrate,
}

/// Error returned when parsing an `OperationKind` from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationKindParseError;

impl fmt::Display for OperationKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid operation (expected 'stake', 'unstake', or 'migrate')"
        )
    }
}

impl FromStr for OperationKind {
    type Err = OperationKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stake" => Ok(Self::Stake),
            "unstake" => Ok(Self::Unstake),
            "migrate" => Ok(Self::Migrate),
            _ => Err(OperationKindParseError),
        }
    }
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stake => "stake",
            Self::Unstake => "unstake",
            Self::Migrate => "migrate",
        }
    }

    pub fn opcode(&self) -> u32 {
        match self {
            Self::Stake => op::DEPOSIT_COINS,
            Self::Unstake => op::UNSTAKE_TOKENS,
            Self::Migrate => op::UPGRADE_WALLET,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A built operation awaiting signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub correlation_id: CorrelationId,
    pub kind: OperationKind,
    /// Amount the user asked for (TON for stake, hTON otherwise)
    pub amount: Nano,
    /// Message destination
    pub destination: Address,
    /// Value attached to the message
    pub value: Nano,
    pub payload: Vec<u8>,
}

impl TransactionIntent {
    /// Header the contracts echo back for this operation
    pub fn header(&self) -> MessageHeader {
        MessageHeader::new(self.kind.opcode(), self.correlation_id)
    }

    /// Turn the intent into a signing request valid until `now + valid_for`
    pub fn to_sign_request(
        &self,
        from: &Address,
        network: Network,
        now: UnixTime,
        valid_for: u64,
    ) -> SignRequest {
        SignRequest {
            from: from.clone(),
            destination: self.destination.clone(),
            amount: self.value,
            payload: self.payload.clone(),
            valid_until: now + valid_for,
            network,
        }
    }
}

/// Request to stake TON
#[derive(Debug, Clone)]
pub struct StakeRequest<'a> {
    pub amount: Nano,
    /// User's TON balance
    pub ton_balance: Nano,
    pub treasury: &'a Address,
    pub treasury_state: &'a TreasuryState,
    pub fees: &'a Fees,
    pub referrer: Option<&'a Address>,
}

/// Request to unstake hTON
#[derive(Debug, Clone)]
pub struct UnstakeRequest<'a> {
    pub amount: Nano,
    /// User's hTON balance
    pub token_balance: Nano,
    /// User's hTON wallet
    pub wallet: &'a Address,
    pub wallet_fees: Option<&'a WalletFees>,
    pub fees: &'a Fees,
}

/// Request to move a legacy balance to the current treasury
#[derive(Debug, Clone)]
pub struct MigrateRequest<'a> {
    /// Legacy tokens to move (the whole balance)
    pub balance: Nano,
    /// User's wallet in the legacy treasury
    pub legacy_wallet: &'a Address,
}

/// Validate a stake before building
pub fn validate_stake(req: &StakeRequest<'_>) -> Result<(), ProtocolError> {
    if req.amount == 0 {
        return Err(ProtocolError::InvalidAmount {
            message: "Amount must be positive".to_string(),
        });
    }
    if req.treasury_state.stopped {
        return Err(ProtocolError::ActionNotAllowed {
            reason: "Treasury is stopped".to_string(),
        });
    }
    let max = max_stakeable(req.ton_balance, req.fees.deposit_coins_fee);
    if req.amount > max {
        return Err(ProtocolError::InsufficientBalance {
            required: req.amount,
            available: max,
        });
    }
    Ok(())
}

/// Validate an unstake before building
pub fn validate_unstake(req: &UnstakeRequest<'_>) -> Result<(), ProtocolError> {
    if req.amount == 0 {
        return Err(ProtocolError::InvalidAmount {
            message: "Amount must be positive".to_string(),
        });
    }
    if req.amount > req.token_balance {
        return Err(ProtocolError::InsufficientBalance {
            required: req.amount,
            available: req.token_balance,
        });
    }
    Ok(())
}

/// Build a stake: deposit to the treasury with amount plus the deposit fee attached
pub fn build_stake(
    req: &StakeRequest<'_>,
    correlation_id: CorrelationId,
) -> Result<TransactionIntent, Error> {
    validate_stake(req)?;

    let mut body = Vec::with_capacity(34);
    match req.referrer {
        Some(referrer) => {
            let (workchain, account) = decode_address(referrer)?;
            body.push(1);
            body.push(workchain as u8);
            body.extend_from_slice(&account);
        }
        None => body.push(0),
    }

    Ok(TransactionIntent {
        correlation_id,
        kind: OperationKind::Stake,
        amount: req.amount,
        destination: req.treasury.clone(),
        value: stake_message_value(req.amount, req.fees),
        payload: build_payload(OperationKind::Stake, correlation_id, &body),
    })
}

/// Build an unstake: send tokens from the user's hTON wallet
pub fn build_unstake(
    req: &UnstakeRequest<'_>,
    correlation_id: CorrelationId,
) -> Result<TransactionIntent, Error> {
    validate_unstake(req)?;

    Ok(TransactionIntent {
        correlation_id,
        kind: OperationKind::Unstake,
        amount: req.amount,
        destination: req.wallet.clone(),
        value: unstake_message_value(req.wallet_fees, req.fees),
        payload: build_payload(
            OperationKind::Unstake,
            correlation_id,
            &req.amount.to_be_bytes(),
        ),
    })
}

/// Build a legacy wallet upgrade for the whole legacy balance
pub fn build_migrate(
    req: &MigrateRequest<'_>,
    correlation_id: CorrelationId,
) -> Result<TransactionIntent, Error> {
    if req.balance == 0 {
        return Err(ProtocolError::ActionNotAllowed {
            reason: "No legacy balance to migrate".to_string(),
        }
        .into());
    }

    Ok(TransactionIntent {
        correlation_id,
        kind: OperationKind::Migrate,
        amount: req.balance,
        destination: req.legacy_wallet.clone(),
        value: params::UPGRADE_WALLET_FEE,
        payload: build_payload(
            OperationKind::Migrate,
            correlation_id,
            &req.balance.to_be_bytes(),
        ),
    })
}

/// Prefix a body with the operation header
pub fn build_payload(kind: OperationKind, correlation_id: CorrelationId, body: &[u8]) -> Vec<u8> {
    let header = MessageHeader::new(kind.opcode(), correlation_id).encode();
    let mut payload = Vec::with_capacity(header.len() + body.len());
    payload.extend_from_slice(&header);
    payload.extend_from_slice(body);
    payload
}

/// Decode an address into workchain and account id.
///
/// Accepts the raw `workchain:hex` form and the 48-character user-friendly
/// form (`flags | workchain | account | crc16`, base64 or base64url).
pub fn decode_address(address: &Address) -> Result<(i8, [u8; 32]), TxError> {
    let invalid = || TxError::BuildFailed {
        message: format!("invalid address: {}", address),
    };

    if let Some((workchain, _)) = address.as_str().split_once(':') {
        let workchain: i8 = workchain.parse().map_err(|_| invalid())?;
        let account = address.raw_account_id().ok_or_else(invalid)?;
        return Ok((workchain, account));
    }

    let text = address.as_str();
    let bytes = URL_SAFE
        .decode(text)
        .or_else(|_| STANDARD.decode(text))
        .map_err(|_| invalid())?;
    if bytes.len() != 36 {
        return Err(invalid());
    }
    let account: [u8; 32] = bytes[2..34].try_into().map_err(|_| invalid())?;
    Ok((bytes[1] as i8, account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::treasury_stack;
    use ton_client::StackReader;

    fn treasury_state() -> TreasuryState {
        TreasuryState::from_stack(StackReader::new(
            TreasuryState::METHOD,
            treasury_stack(1_000, 900, vec![]),
        ))
        .unwrap()
    }

    fn fees() -> Fees {
        Fees {
            deposit_coins_fee: 100_000_000,
            unstake_tokens_fee: 200_000_000,
        }
    }

    #[test]
    fn test_operation_kind_parsing() {
        assert_eq!("stake".parse::<OperationKind>(), Ok(OperationKind::Stake));
        assert_eq!("migrate".parse::<OperationKind>(), Ok(OperationKind::Migrate));
        assert!("swap".parse::<OperationKind>().is_err());
        assert_eq!(OperationKind::Unstake.opcode(), op::UNSTAKE_TOKENS);
    }

    #[test]
    fn test_build_stake() {
        let treasury = Address::new("EQtreasury");
        let state = treasury_state();
        let fees = fees();
        let req = StakeRequest {
            amount: 1_000_000_000,
            ton_balance: 5_000_000_000,
            treasury: &treasury,
            treasury_state: &state,
            fees: &fees,
            referrer: None,
        };
        let intent = build_stake(&req, CorrelationId(42)).unwrap();
        assert_eq!(intent.destination, treasury);
        assert_eq!(intent.value, 1_100_000_000);
        assert_eq!(intent.payload.len(), 13);
        assert_eq!(MessageHeader::parse(&intent.payload), Some(intent.header()));
        assert_eq!(intent.payload[12], 0);

        let sign = intent.to_sign_request(&Address::new("0:aa"), Network::Mainnet, 1_000, 300);
        assert_eq!(sign.valid_until, 1_300);
        assert_eq!(sign.amount, 1_100_000_000);
    }

    #[test]
    fn test_stake_with_referrer() {
        let treasury = Address::new("EQtreasury");
        let referrer = Address::from_raw(0, &[9u8; 32]);
        let state = treasury_state();
        let fees = fees();
        let req = StakeRequest {
            amount: 1_000_000_000,
            ton_balance: 5_000_000_000,
            treasury: &treasury,
            treasury_state: &state,
            fees: &fees,
            referrer: Some(&referrer),
        };
        let intent = build_stake(&req, CorrelationId(1)).unwrap();
        assert_eq!(intent.payload.len(), 12 + 34);
        assert_eq!(intent.payload[12], 1);
        assert_eq!(intent.payload[13], 0);
        assert_eq!(&intent.payload[14..], &[9u8; 32]);
    }

    #[test]
    fn test_stake_over_max_rejected() {
        let treasury = Address::new("EQtreasury");
        let state = treasury_state();
        let fees = fees();
        let req = StakeRequest {
            amount: 1_000_000_000,
            ton_balance: 1_100_000_000,
            treasury: &treasury,
            treasury_state: &state,
            fees: &fees,
            referrer: None,
        };
        let err = validate_stake(&req).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InsufficientBalance {
                required: 1_000_000_000,
                available: 900_000_000,
            }
        );
    }

    #[test]
    fn test_build_unstake_adds_storage_fee() {
        let wallet = Address::new("EQwallet");
        let fees = fees();
        let wallet_fees = WalletFees {
            unstake_tokens_fee: 100,
            storage_fee: 50,
            ton_balance: 0,
        };
        let req = UnstakeRequest {
            amount: 700,
            token_balance: 700,
            wallet: &wallet,
            wallet_fees: Some(&wallet_fees),
            fees: &fees,
        };
        let intent = build_unstake(&req, CorrelationId(7)).unwrap();
        assert_eq!(intent.destination, wallet);
        assert_eq!(intent.value, 150);
        assert_eq!(&intent.payload[12..], &700u128.to_be_bytes());

        let req = UnstakeRequest { amount: 701, ..req };
        assert!(build_unstake(&req, CorrelationId(7)).is_err());
    }

    #[test]
    fn test_build_migrate() {
        let legacy_wallet = Address::new("EQold");
        let intent = build_migrate(
            &MigrateRequest {
                balance: 50,
                legacy_wallet: &legacy_wallet,
            },
            CorrelationId(3),
        )
        .unwrap();
        assert_eq!(intent.kind, OperationKind::Migrate);
        assert_eq!(intent.value, params::UPGRADE_WALLET_FEE);
        assert_eq!(intent.header().opcode, op::UPGRADE_WALLET);

        let err = build_migrate(
            &MigrateRequest {
                balance: 0,
                legacy_wallet: &legacy_wallet,
            },
            CorrelationId(3),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_decode_friendly_address() {
        let (workchain, account) =
            decode_address(&Address::new(crate::mainnet::TREASURY_ADDRESS)).unwrap();
        assert_eq!(workchain, 0);
        assert_eq!(account[0], 0x4d);

        let (workchain, _) =
            decode_address(&Address::new(crate::testnet::TREASURY_ADDRESS)).unwrap();
        assert_eq!(workchain, 0);

        assert!(decode_address(&Address::new("EQshort")).is_err());
        assert!(decode_address(&Address::new("x:00")).is_err());
    }
}
