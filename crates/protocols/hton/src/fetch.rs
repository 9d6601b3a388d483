//! Hipo State Fetching from Node
//!
//! Runs the treasury and wallet get methods and parses their stacks.
//! Block-pinned reads take a height; methods that need the network config
//! (`get_times`, `get_fees`, `get_wallet_fees`) run against the latest state.

use hipo_core::{Address, BlockHeight, Nano, NodeError, Result};
use ton_client::{NodeClient, StackValue};

use crate::params;
use crate::state::{Fees, Times, TreasuryState, WalletFees, WalletState};

/// Fetch treasury state at a block height
pub async fn fetch_treasury_state(
    client: &NodeClient,
    treasury: &Address,
    height: BlockHeight,
) -> Result<TreasuryState> {
    let reader = client
        .run_get_method(treasury, Some(height), TreasuryState::METHOD, &[])
        .await?;
    Ok(TreasuryState::from_stack(reader)?)
}

/// Fetch round timing
pub async fn fetch_times(client: &NodeClient, treasury: &Address) -> Result<Times> {
    let reader = client
        .run_get_method(treasury, None, Times::METHOD, &[])
        .await?;
    Ok(Times::from_stack(reader)?)
}

/// Fetch treasury operation fees
pub async fn fetch_fees(client: &NodeClient, treasury: &Address) -> Result<Fees> {
    let reader = client
        .run_get_method(treasury, None, Fees::METHOD, &[])
        .await?;
    Ok(Fees::from_stack(reader)?)
}

/// Ask `resolver` (the treasury or its parent) for an owner's wallet address
pub async fn fetch_wallet_address(
    client: &NodeClient,
    resolver: &Address,
    owner: &Address,
    height: Option<BlockHeight>,
) -> Result<Address> {
    let mut reader = client
        .run_get_method(
            resolver,
            height,
            "get_wallet_address",
            &[StackValue::Address(owner.clone())],
        )
        .await?;
    Ok(reader.read_address()?)
}

/// Fetch wallet state at a block height. A wallet that is not deployed yet
/// reads as [`WalletState::zero`].
pub async fn fetch_wallet_state(
    client: &NodeClient,
    wallet: &Address,
    height: BlockHeight,
) -> Result<WalletState> {
    match client
        .run_get_method(wallet, Some(height), WalletState::METHOD, &[])
        .await
    {
        Ok(reader) => Ok(WalletState::from_stack(reader)?),
        Err(NodeError::AccountNotDeployed { .. }) => {
            tracing::debug!(wallet = %wallet, height, "Wallet not deployed, using zero state");
            Ok(WalletState::zero())
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetch wallet fees. Wallet code that predates `get_wallet_fees` fails
/// with exit code 11 and gets [`WalletFees::legacy`].
pub async fn fetch_wallet_fees(client: &NodeClient, wallet: &Address) -> Result<WalletFees> {
    match client
        .run_get_method(wallet, None, WalletFees::METHOD, &[])
        .await
    {
        Ok(reader) => Ok(WalletFees::from_stack(reader)?),
        Err(e) if e.exit_code() == Some(params::EXIT_CODE_METHOD_NOT_FOUND) => {
            tracing::debug!(wallet = %wallet, "Wallet has no get_wallet_fees, using legacy fees");
            Ok(WalletFees::legacy())
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetch an account's TON balance at a block height
pub async fn fetch_balance(
    client: &NodeClient,
    account: &Address,
    height: BlockHeight,
) -> Result<Nano> {
    Ok(client.account_balance(account, height).await?)
}
