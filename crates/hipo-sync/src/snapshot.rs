//! Snapshot and times jobs
//!
//! A snapshot cycle reads the treasury, the connected account's wallet and
//! TON balance, and the treasury fees, all pinned to one block height, and
//! applies them to the store as one write. The legacy treasury check runs
//! after a successful apply and never blocks the cycle.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hipo_core::{Address, BlockHeight, Error, NodeError};
use hton::{
    fetch_balance, fetch_fees, fetch_legacy_position, fetch_times, fetch_treasury_state,
    fetch_wallet_address, fetch_wallet_fees, fetch_wallet_state, ContractAddresses, Fees,
    TreasuryState, WalletFees,
};
use ton_client::NodeClient;

use crate::context::SyncContext;
use crate::error::SyncError;
use crate::model::{LegacyStatus, Snapshot, WalletSnapshot};
use crate::scheduler::LoopJob;

/// What the cycle needs from the store, read once at its start
struct CycleInput {
    network_gen: u64,
    account_gen: u64,
    account: Option<Address>,
    cursor: Option<BlockHeight>,
    contracts: ContractAddresses,
    wallet_address: Option<Address>,
    fees: Option<Fees>,
    wallet_fees: Option<WalletFees>,
}

pub struct SnapshotJob {
    ctx: Arc<SyncContext>,
    /// `(network_gen, account_gen)` of a running legacy check
    legacy_in_flight: Arc<Mutex<Option<(u64, u64)>>>,
}

impl SnapshotJob {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self {
            ctx,
            legacy_in_flight: Arc::new(Mutex::new(None)),
        }
    }

    fn input(&self) -> CycleInput {
        self.ctx.store.read(|s| CycleInput {
            network_gen: s.network_gen,
            account_gen: s.account_gen,
            account: s.account.clone(),
            cursor: s.cursor,
            contracts: s.contracts.clone(),
            wallet_address: s.wallet_address.clone(),
            fees: s.fees,
            wallet_fees: s.wallet_fees,
        })
    }

    /// Read one snapshot at the endpoint's latest height
    pub async fn read_snapshot(&self) -> Result<Snapshot, SyncError> {
        let input = self.input();
        let client = self.ctx.client(input.network_gen)?;

        let height = client.current_height().await?;
        if let Some(cursor) = input.cursor {
            if height < cursor {
                return Err(SyncError::Stale { height, cursor });
            }
        }

        let treasury_addr = &input.contracts.treasury;
        let treasury_and_wallet = read_treasury_and_wallet(&client, &input, height);
        let balance = async {
            match &input.account {
                Some(account) => fetch_balance(&client, account, height).await.map(Some),
                None => Ok(None),
            }
        };
        let fees = async {
            match input.fees {
                Some(fees) => Ok(fees),
                None => fetch_fees(&client, treasury_addr).await,
            }
        };

        let ((treasury, wallet), ton_balance, fees) =
            futures::try_join!(treasury_and_wallet, balance, fees)?;

        Ok(Snapshot {
            network_gen: input.network_gen,
            account_gen: input.account_gen,
            height,
            treasury,
            fees,
            ton_balance,
            wallet,
        })
    }

    /// Start the legacy check for the current account unless it already ran
    /// or is running
    fn spawn_legacy_check(&self, client: NodeClient, height: BlockHeight) {
        let Some((network_gen, account_gen, owner, legacy_treasury, treasury)) =
            self.ctx.store.read(|s| {
                if s.legacy != LegacyStatus::Unchecked {
                    return None;
                }
                Some((
                    s.network_gen,
                    s.account_gen,
                    s.account.clone()?,
                    s.contracts.legacy_treasury.clone(),
                    s.treasury_state.clone()?,
                ))
            })
        else {
            return;
        };

        let Some(legacy_treasury) = legacy_treasury else {
            let _ = self
                .ctx
                .store
                .set_legacy(network_gen, account_gen, LegacyStatus::Empty);
            return;
        };

        {
            let mut in_flight = self
                .legacy_in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if *in_flight == Some((network_gen, account_gen)) {
                return;
            }
            *in_flight = Some((network_gen, account_gen));
        }

        let store = self.ctx.store.clone();
        let in_flight = self.legacy_in_flight.clone();
        tokio::spawn(async move {
            let result = fetch_legacy_position(
                &client,
                &legacy_treasury,
                &owner,
                height,
                treasury.total_coins,
                treasury.total_tokens,
            )
            .await;

            match result {
                Ok(position) => {
                    let status = position.map_or(LegacyStatus::Empty, LegacyStatus::Found);
                    if let Err(e) = store.set_legacy(network_gen, account_gen, status) {
                        tracing::debug!(reason = %e, "Legacy result discarded");
                    }
                }
                // checked again next cycle
                Err(e) => tracing::debug!(owner = %owner, error = %e, "Legacy check failed"),
            }

            let mut in_flight = in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if *in_flight == Some((network_gen, account_gen)) {
                *in_flight = None;
            }
        });
    }
}

/// Treasury state plus the account's wallet. The wallet address is resolved
/// through the treasury state on the first cycle for an account and reused
/// afterwards, so later cycles read both in parallel.
async fn read_treasury_and_wallet(
    client: &NodeClient,
    input: &CycleInput,
    height: BlockHeight,
) -> hipo_core::Result<(TreasuryState, Option<WalletSnapshot>)> {
    let treasury_addr = &input.contracts.treasury;
    let Some(owner) = &input.account else {
        let treasury = fetch_treasury_state(client, treasury_addr, height).await?;
        return Ok((treasury, None));
    };

    let (treasury, address, state) = match &input.wallet_address {
        Some(address) => {
            let (treasury, state) = futures::try_join!(
                fetch_treasury_state(client, treasury_addr, height),
                fetch_wallet_state(client, address, height),
            )?;
            (treasury, address.clone(), state)
        }
        None => {
            let treasury = fetch_treasury_state(client, treasury_addr, height).await?;
            let resolver = treasury.wallet_resolver(treasury_addr);
            let address = fetch_wallet_address(client, resolver, owner, Some(height)).await?;
            let state = fetch_wallet_state(client, &address, height).await?;
            (treasury, address, state)
        }
    };

    // An empty wallet has nothing to unstake; fees are read once it holds something
    let fees = match input.wallet_fees {
        Some(fees) => Some(fees),
        None if state.is_empty() => None,
        None => match fetch_wallet_fees(client, &address).await {
            Ok(fees) => Some(fees),
            Err(Error::Node(NodeError::AccountNotDeployed { .. })) => None,
            Err(e) => return Err(e),
        },
    };

    Ok((
        treasury,
        Some(WalletSnapshot {
            address,
            state,
            fees,
        }),
    ))
}

#[async_trait]
impl LoopJob for SnapshotJob {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn run(&self) -> Result<(), SyncError> {
        let snapshot = self.read_snapshot().await?;
        let (network_gen, height) = (snapshot.network_gen, snapshot.height);
        self.ctx.store.apply_snapshot(snapshot)?;
        tracing::debug!(height, "Snapshot applied");

        if let Ok(client) = self.ctx.client(network_gen) {
            self.spawn_legacy_check(client, height);
        }
        Ok(())
    }
}

/// Refreshes round timing
pub struct TimesJob {
    ctx: Arc<SyncContext>,
}

impl TimesJob {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl LoopJob for TimesJob {
    fn name(&self) -> &'static str {
        "times"
    }

    async fn run(&self) -> Result<(), SyncError> {
        let (network_gen, treasury) = self
            .ctx
            .store
            .read(|s| (s.network_gen, s.contracts.treasury.clone()));
        let client = self.ctx.client(network_gen)?;
        let times = fetch_times(&client, &treasury).await?;
        self.ctx.store.set_times(network_gen, times)
    }
}
