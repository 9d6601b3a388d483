//! Sync engine
//!
//! Owns the store, the three polling loops (endpoint discovery, round timing,
//! block snapshot), and the transaction tracker, and exposes the actions a UI
//! calls. The engine is cheap to clone; all clones share one state.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use hipo_core::{
    Address, AppConfig, BlockHeight, Error, Nano, Network, ProtocolError, TxError, UnixTime,
};
use hton::{
    build_migrate, build_stake, build_unstake, format_amount, parse_amount, ContractAddresses,
    Fees, MigrateRequest, StakeRequest, Times, TreasuryState, UnstakeRequest, WalletFees,
    WalletState,
};
use serde::{Deserialize, Serialize};
use ton_client::{probe_endpoint, EndpointProvider, NodeClient, SigningBridge};

use crate::context::SyncContext;
use crate::derived::{Derived, Timed};
use crate::error::SyncError;
use crate::model::{LegacyStatus, Lifecycle, Notice, NoticeKind, PendingOperation, Tab, View};
use crate::scheduler::{LoopJob, LoopState, PollingLoop};
use crate::snapshot::{SnapshotJob, TimesJob};
use crate::store::Store;
use crate::tracker::{new_correlation_id, unix_now, TransactionTracker};

const ERROR_BLOCKCHAIN_ACCESS: &str = "Unable to access blockchain";

/// Account reported by the wallet connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub address: Address,
    /// Network the wallet is on
    pub network: Network,
}

/// State of each polling loop
#[derive(Debug, Clone, Serialize)]
pub struct LoopStates {
    pub discovery: LoopState,
    pub times: LoopState,
    pub snapshot: LoopState,
}

/// Read-only view of everything the UI renders
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub network: Network,
    pub account: Option<Address>,
    pub visible: bool,
    pub active_view: View,
    pub active_tab: Tab,
    pub amount: String,
    pub referrer: Option<Address>,
    pub endpoint_connected: bool,
    pub cursor: Option<BlockHeight>,
    pub treasury: Option<TreasuryState>,
    pub ton_balance: Option<Nano>,
    pub fees: Option<Fees>,
    pub wallet_address: Option<Address>,
    pub wallet_state: Option<WalletState>,
    pub wallet_fees: Option<WalletFees>,
    pub times: Option<Times>,
    pub legacy: LegacyStatus,
    pub lifecycle: Lifecycle,
    pub pending: Option<PendingOperation>,
    pub notice: Option<Notice>,
    pub derived: Derived,
    pub timed: Timed,
    pub loops: LoopStates,
}

/// Connects to an endpoint and keeps checking it
struct DiscoveryJob {
    ctx: Arc<SyncContext>,
    provider: Arc<dyn EndpointProvider>,
    /// Loops kicked after a fresh connection
    followers: OnceLock<Vec<Weak<PollingLoop>>>,
}

#[async_trait]
impl LoopJob for DiscoveryJob {
    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn run(&self) -> Result<(), SyncError> {
        let store = &self.ctx.store;
        let (network_gen, network) = store.read(|s| (s.network_gen, s.network));

        if let Ok(client) = self.ctx.client(network_gen) {
            let timeout = self.ctx.config.rpc.request_timeout();
            if let Some(probe) = probe_endpoint(client.inner(), network, timeout).await {
                tracing::trace!(
                    height = probe.chain_height,
                    latency_ms = probe.latency_ms,
                    "Endpoint healthy"
                );
                return Ok(());
            }
            tracing::warn!(%network, "Endpoint stopped answering, rediscovering");
            self.ctx.clear_client();
            store.set_endpoint_connected(network_gen, false)?;
        }

        let client =
            NodeClient::connect(self.provider.as_ref(), network, &self.ctx.config.rpc).await?;
        self.ctx.set_client(network_gen, client);
        store.set_endpoint_connected(network_gen, true)?;

        if store.read(|s| s.is_live()) {
            let followers = self.followers.get().into_iter().flatten();
            for follower in followers.filter_map(Weak::upgrade) {
                follower.trigger();
            }
        }
        Ok(())
    }
}

struct EngineInner {
    ctx: Arc<SyncContext>,
    discovery: Arc<PollingLoop>,
    times: Arc<PollingLoop>,
    snapshot: Arc<PollingLoop>,
    tracker: Arc<TransactionTracker>,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn EndpointProvider>,
        bridge: Arc<dyn SigningBridge>,
    ) -> Self {
        let network = config.network;
        let contracts = ContractAddresses::for_network(network, config.contracts(network));
        let store = Arc::new(Store::new(network, contracts));
        let ctx = Arc::new(SyncContext::new(config, store));
        let sync = &ctx.config.sync;

        let polling = |job: Arc<dyn LoopJob>, interval| {
            let notify = ctx.clone();
            Arc::new(
                PollingLoop::new(job, interval, sync.retry_delay())
                    .on_transient(move |_| notify.notify_transient(ERROR_BLOCKCHAIN_ACCESS)),
            )
        };

        let discovery_job = Arc::new(DiscoveryJob {
            ctx: ctx.clone(),
            provider,
            followers: OnceLock::new(),
        });
        let snapshot_job: Arc<dyn LoopJob> = Arc::new(SnapshotJob::new(ctx.clone()));

        let discovery = polling(
            discovery_job.clone() as Arc<dyn LoopJob>,
            sync.discovery_interval(),
        );
        let times_job: Arc<dyn LoopJob> = Arc::new(TimesJob::new(ctx.clone()));
        let times = polling(times_job, sync.times_interval());
        let snapshot = polling(snapshot_job.clone(), sync.snapshot_interval());
        let _ = discovery_job
            .followers
            .set(vec![Arc::downgrade(&times), Arc::downgrade(&snapshot)]);

        let tracker = Arc::new(TransactionTracker::new(ctx.clone(), bridge, snapshot_job));

        Self {
            inner: Arc::new(EngineInner {
                ctx,
                discovery,
                times,
                snapshot,
                tracker,
            }),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.ctx.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.ctx.config
    }

    fn loops(&self) -> [&Arc<PollingLoop>; 3] {
        [&self.inner.discovery, &self.inner.times, &self.inner.snapshot]
    }

    /// Start polling if the current view needs live data
    pub fn start(&self) {
        if self.store().read(|s| s.is_live()) {
            self.resume();
        } else {
            self.suspend();
        }
    }

    fn resume(&self) {
        tracing::debug!("Resuming loops");
        for lp in self.loops() {
            lp.start();
        }
    }

    fn suspend(&self) {
        tracing::debug!("Suspending loops");
        for lp in self.loops() {
            lp.suspend();
        }
    }

    /// Stop every loop and the tracker
    pub fn shutdown(&self) {
        for lp in self.loops() {
            lp.stop();
        }
        self.inner.tracker.abort();
    }

    /// Run `f` and resume or suspend the loops if liveness changed
    fn with_liveness(&self, f: impl FnOnce(&Store)) {
        let store = self.store();
        let was_live = store.read(|s| s.is_live());
        f(store);
        let live = store.read(|s| s.is_live());
        match (was_live, live) {
            (false, true) => self.resume(),
            (true, false) => self.suspend(),
            _ => {}
        }
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Switch network: clears all mirrored state and restarts the loops
    pub fn select_network(&self, network: Network) {
        if self.store().read(|s| s.network) == network {
            return;
        }
        tracing::info!(%network, "Switching network");
        self.shutdown();
        self.inner.ctx.clear_client();
        let contracts =
            ContractAddresses::for_network(network, self.config().contracts(network));
        self.store().reset_network(network, contracts);
        self.start();
    }

    /// Wallet connected or disconnected. A wallet on the other network is
    /// treated as disconnected and a notice is shown.
    pub fn set_account(&self, account: Option<WalletAccount>) {
        let network = self.store().read(|s| s.network);
        let address = match account {
            Some(account) if account.network != network => {
                tracing::warn!(wallet_network = %account.network, %network, "Wallet on wrong network");
                self.inner.ctx.notify_for(
                    NoticeKind::NetworkMismatch,
                    format!("Your wallet must be on {}", network_label(network)),
                    self.config().sync.mismatch_notice(),
                );
                None
            }
            Some(account) => Some(account.address),
            None => None,
        };

        let changed = self.store().read(|s| s.account != address);
        self.store().set_account(address);
        if changed && self.store().read(|s| s.is_live()) {
            self.inner.snapshot.trigger();
        }
    }

    pub fn set_visibility(&self, visible: bool) {
        self.with_liveness(|store| store.set_visibility(visible));
    }

    pub fn set_active_view(&self, view: View) {
        self.with_liveness(|store| store.set_active_view(view));
    }

    pub fn set_active_tab(&self, tab: Tab) {
        self.store().set_active_tab(tab);
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        self.store().set_amount(amount);
    }

    /// Fill the amount input with the maximum for the active tab
    pub fn set_amount_to_max(&self) {
        let max = self.store().derived().max_amount;
        self.store().set_amount(format_amount(max));
    }

    pub fn set_referrer(&self, referrer: Option<Address>) {
        self.store().set_referrer(referrer);
    }

    // ─── Operations ──────────────────────────────────────────────────────

    /// Stake `amount` nanoTON
    pub async fn submit_stake(&self, amount: Nano) -> Result<(), Error> {
        let intent = self.store().read(|s| {
            s.account.as_ref().ok_or(TxError::WalletNotConnected)?;
            let treasury_state = s.treasury_state.as_ref().ok_or_else(|| unavailable("treasury"))?;
            let fees = s.fees.as_ref().ok_or_else(|| unavailable("fees"))?;
            let ton_balance = s.ton_balance.ok_or_else(|| unavailable("balance"))?;
            build_stake(
                &StakeRequest {
                    amount,
                    ton_balance,
                    treasury: &s.contracts.treasury,
                    treasury_state,
                    fees,
                    referrer: s.referrer.as_ref(),
                },
                new_correlation_id(),
            )
        })?;
        self.inner.tracker.submit(intent).await
    }

    /// Unstake `amount` nano-hTON
    pub async fn submit_unstake(&self, amount: Nano) -> Result<(), Error> {
        let intent = self.store().read(|s| {
            s.account.as_ref().ok_or(TxError::WalletNotConnected)?;
            let wallet = s.wallet_address.as_ref().ok_or_else(|| unavailable("wallet"))?;
            let state = s.wallet_state.as_ref().ok_or_else(|| unavailable("wallet"))?;
            let fees = s.fees.as_ref().ok_or_else(|| unavailable("fees"))?;
            build_unstake(
                &UnstakeRequest {
                    amount,
                    token_balance: state.tokens,
                    wallet,
                    wallet_fees: s.wallet_fees.as_ref(),
                    fees,
                },
                new_correlation_id(),
            )
        })?;
        self.inner.tracker.submit(intent).await
    }

    /// Move the whole legacy balance to the current treasury
    pub async fn submit_migration(&self) -> Result<(), Error> {
        let intent = self.store().read(|s| {
            s.account.as_ref().ok_or(TxError::WalletNotConnected)?;
            let position = s.legacy.position().ok_or_else(|| ProtocolError::ActionNotAllowed {
                reason: "No legacy balance to migrate".to_string(),
            })?;
            build_migrate(
                &MigrateRequest {
                    balance: position.balance,
                    legacy_wallet: &position.wallet,
                },
                new_correlation_id(),
            )
        })?;
        self.inner.tracker.submit(intent).await
    }

    /// Stake or unstake the amount input, depending on the active tab
    pub async fn submit(&self) -> Result<(), Error> {
        let (tab, amount) = self.store().read(|s| (s.active_tab, parse_amount(&s.amount)));
        let amount = amount.nano().ok_or_else(|| ProtocolError::InvalidAmount {
            message: "Amount is not a number".to_string(),
        })?;
        match tab {
            Tab::Stake => self.submit_stake(amount).await,
            Tab::Unstake => self.submit_unstake(amount).await,
        }
    }

    pub fn dismiss_timeout(&self) -> Result<(), Error> {
        self.inner.tracker.dismiss_timeout()
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot_at(unix_now())
    }

    pub fn snapshot_at(&self, now: UnixTime) -> EngineSnapshot {
        let store = self.store();
        let derived = (*store.derived()).clone();
        let timed = store.timed(now);
        let loops = LoopStates {
            discovery: self.inner.discovery.state(),
            times: self.inner.times.state(),
            snapshot: self.inner.snapshot.state(),
        };
        store.read(|s| EngineSnapshot {
            network: s.network,
            account: s.account.clone(),
            visible: s.visible,
            active_view: s.active_view,
            active_tab: s.active_tab,
            amount: s.amount.clone(),
            referrer: s.referrer.clone(),
            endpoint_connected: s.endpoint_connected,
            cursor: s.cursor,
            treasury: s.treasury_state.clone(),
            ton_balance: s.ton_balance,
            fees: s.fees,
            wallet_address: s.wallet_address.clone(),
            wallet_state: s.wallet_state.clone(),
            wallet_fees: s.wallet_fees,
            times: s.times,
            legacy: s.legacy.clone(),
            lifecycle: s.lifecycle,
            pending: s.pending.clone(),
            notice: s.notice.clone(),
            derived,
            timed,
            loops,
        })
    }
}

fn unavailable(what: &str) -> Error {
    ProtocolError::StateUnavailable {
        reason: format!("{} not loaded yet", what),
    }
    .into()
}

fn network_label(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "MainNet",
        Network::Testnet => "TestNet",
    }
}
