//! Legacy Treasury Migration
//!
//! Detects hTON left in the deprecated predecessor treasury and converts it
//! to the equivalent amount in the current treasury.

use hipo_core::{Address, BlockHeight, Nano, Result};
use serde::Serialize;
use ton_client::NodeClient;

use crate::fetch::{fetch_wallet_address, fetch_wallet_state};

/// Residual balance in the legacy treasury
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyPosition {
    /// The user's wallet in the legacy treasury
    pub wallet: Address,
    /// Legacy tokens held
    pub balance: Nano,
    /// Equivalent amount of current tokens
    pub converted: Nano,
}

/// Convert legacy tokens to current tokens through their TON value:
/// `balance * legacy_coins / legacy_tokens * current_tokens / current_coins`.
///
/// Integer math with a single final division. Falls back to truncating after
/// each step when the full product overflows. Any zero divisor makes the
/// balance non-convertible and yields 0.
pub fn convert_legacy(
    balance: Nano,
    legacy_coins: Nano,
    legacy_tokens: Nano,
    current_coins: Nano,
    current_tokens: Nano,
) -> Nano {
    if legacy_tokens == 0 || current_coins == 0 {
        return 0;
    }

    let exact = balance
        .checked_mul(legacy_coins)
        .and_then(|v| v.checked_mul(current_tokens))
        .zip(legacy_tokens.checked_mul(current_coins))
        .map(|(num, den)| num / den);

    exact
        .or_else(|| {
            let coins = balance.checked_mul(legacy_coins)? / legacy_tokens;
            Some(coins.checked_mul(current_tokens)? / current_coins)
        })
        .unwrap_or(0)
}

/// Read the legacy treasury's reserves (`[total_coins, total_tokens, ..]`)
async fn fetch_legacy_reserves(
    client: &NodeClient,
    legacy_treasury: &Address,
    height: BlockHeight,
) -> Result<(Nano, Nano)> {
    let mut reader = client
        .run_get_method(legacy_treasury, Some(height), "get_treasury_state", &[])
        .await?;
    Ok((reader.read_u128()?, reader.read_u128()?))
}

/// Check an account for a residual legacy balance.
///
/// Returns `None` when the account holds nothing in the legacy treasury.
pub async fn fetch_legacy_position(
    client: &NodeClient,
    legacy_treasury: &Address,
    owner: &Address,
    height: BlockHeight,
    current_coins: Nano,
    current_tokens: Nano,
) -> Result<Option<LegacyPosition>> {
    let wallet = fetch_wallet_address(client, legacy_treasury, owner, Some(height)).await?;
    let balance = fetch_wallet_state(client, &wallet, height).await?.tokens;
    if balance == 0 {
        return Ok(None);
    }

    let (legacy_coins, legacy_tokens) =
        fetch_legacy_reserves(client, legacy_treasury, height).await?;
    let converted = convert_legacy(
        balance,
        legacy_coins,
        legacy_tokens,
        current_coins,
        current_tokens,
    );
    tracing::info!(
        owner = %owner,
        balance,
        converted,
        "Found balance in legacy treasury"
    );

    Ok(Some(LegacyPosition {
        wallet,
        balance,
        converted,
    }))
}
