//! Reactive state store
//!
//! Holds the mirrored on-chain state and the user's selection behind a single
//! lock, so every write is serialized and every multi-field update is atomic.
//! Each write bumps the revision of the fields it changed and then, after the
//! lock is released, calls every observer with one [`Change`] listing those
//! fields. [`Derived`] values are memoized on the revisions of the fields they
//! read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use hipo_core::{Address, BlockHeight, Nano, Network};
use hton::{ContractAddresses, Fees, Times, TreasuryState, WalletFees, WalletState};
use serde::Serialize;

use crate::derived::{Derived, Timed};
use crate::error::SyncError;
use crate::model::{
    LegacyStatus, Lifecycle, Notice, NoticeKind, PendingOperation, Snapshot, Tab, View,
};

/// A stored field, as reported in change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Network,
    Account,
    Visibility,
    ActiveView,
    ActiveTab,
    Amount,
    Referrer,
    Endpoint,
    Cursor,
    Treasury,
    TonBalance,
    Fees,
    Wallet,
    WalletFees,
    Times,
    Legacy,
    Lifecycle,
    Notice,
}

const FIELD_COUNT: usize = 18;

/// Fields read by [`Derived::compute`]
const DERIVED_DEPS: [Field; 11] = [
    Field::Network,
    Field::Account,
    Field::ActiveTab,
    Field::Amount,
    Field::TonBalance,
    Field::Treasury,
    Field::Fees,
    Field::Wallet,
    Field::WalletFees,
    Field::Times,
    Field::Legacy,
];

/// One atomic write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub fields: Vec<Field>,
}

impl Change {
    pub fn touches(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }
}

/// Everything the store holds
#[derive(Debug, Clone)]
pub struct State {
    pub network: Network,
    pub contracts: ContractAddresses,
    /// Bumped on every network switch
    pub network_gen: u64,
    pub account: Option<Address>,
    /// Bumped on every connect, disconnect, and network switch
    pub account_gen: u64,
    pub visible: bool,
    pub active_view: View,
    pub active_tab: Tab,
    pub amount: String,
    pub referrer: Option<Address>,
    pub endpoint_connected: bool,
    /// Last applied block height; never decreases within a network
    pub cursor: Option<BlockHeight>,
    pub treasury_state: Option<TreasuryState>,
    pub ton_balance: Option<Nano>,
    pub fees: Option<Fees>,
    pub wallet_address: Option<Address>,
    /// `None` until resolved; distinct from a zero wallet
    pub wallet_state: Option<WalletState>,
    pub wallet_fees: Option<WalletFees>,
    pub times: Option<Times>,
    pub legacy: LegacyStatus,
    pub lifecycle: Lifecycle,
    pub pending: Option<PendingOperation>,
    pub notice: Option<Notice>,
}

impl State {
    pub fn new(network: Network, contracts: ContractAddresses) -> Self {
        Self {
            network,
            contracts,
            network_gen: 0,
            account: None,
            account_gen: 0,
            visible: true,
            active_view: View::default(),
            active_tab: Tab::default(),
            amount: String::new(),
            referrer: None,
            endpoint_connected: false,
            cursor: None,
            treasury_state: None,
            ton_balance: None,
            fees: None,
            wallet_address: None,
            wallet_state: None,
            wallet_fees: None,
            times: None,
            legacy: LegacyStatus::Unchecked,
            lifecycle: Lifecycle::Idle,
            pending: None,
            notice: None,
        }
    }

    /// The loops should be running
    pub fn is_live(&self) -> bool {
        self.visible && self.active_view.requires_live_data()
    }

    fn clear_account_data(&mut self, touched: &mut Vec<Field>) {
        self.ton_balance = None;
        self.wallet_address = None;
        self.wallet_state = None;
        self.wallet_fees = None;
        self.legacy = LegacyStatus::Unchecked;
        touched.extend([Field::TonBalance, Field::Wallet, Field::WalletFees, Field::Legacy]);
    }
}

struct Inner {
    state: State,
    revisions: [u64; FIELD_COUNT],
}

type Observer = Arc<dyn Fn(&Change) + Send + Sync>;

/// Shared reactive store
pub struct Store {
    inner: Mutex<Inner>,
    memo: Mutex<Option<([u64; DERIVED_DEPS.len()], Arc<Derived>)>>,
    observers: Mutex<Vec<Observer>>,
    recomputes: AtomicU64,
    notice_seq: AtomicU64,
}

impl Store {
    pub fn new(network: Network, contracts: ContractAddresses) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::new(network, contracts),
                revisions: [0; FIELD_COUNT],
            }),
            memo: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
            recomputes: AtomicU64::new(0),
            notice_seq: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking observer cannot leave state half-written: observers run unlocked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read the state under the lock
    pub fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.lock().state)
    }

    /// Copy of the whole state
    pub fn state(&self) -> State {
        self.read(State::clone)
    }

    pub fn revision(&self, field: Field) -> u64 {
        self.lock().revisions[field as usize]
    }

    /// Register an observer; it runs synchronously after every write
    pub fn subscribe(&self, observer: impl Fn(&Change) + Send + Sync + 'static) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(observer));
    }

    /// Apply a write. `f` records the fields it changed; nothing is
    /// notified when it records none.
    fn commit<R>(&self, f: impl FnOnce(&mut State, &mut Vec<Field>) -> R) -> R {
        let mut touched = Vec::new();
        let result = {
            let mut inner = self.lock();
            let result = f(&mut inner.state, &mut touched);
            touched.sort_by_key(|field| *field as usize);
            touched.dedup();
            for field in &touched {
                inner.revisions[*field as usize] += 1;
            }
            result
        };

        if !touched.is_empty() {
            let change = Change { fields: touched };
            let observers = self
                .observers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            for observer in observers {
                observer(&change);
            }
        }
        result
    }

    /// Memoized derived values
    pub fn derived(&self) -> Arc<Derived> {
        let inner = self.lock();
        let key = DERIVED_DEPS.map(|f| inner.revisions[f as usize]);
        let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_key, derived)) = memo.as_ref() {
            if *cached_key == key {
                return derived.clone();
            }
        }
        let derived = Arc::new(Derived::compute(&inner.state));
        self.recomputes.fetch_add(1, Ordering::Relaxed);
        *memo = Some((key, derived.clone()));
        derived
    }

    /// Number of times [`Derived`] was recomputed
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }

    /// Time-dependent values at `now`
    pub fn timed(&self, now: u64) -> Timed {
        self.read(|s| Timed::compute(s, now))
    }

    // --- selection ---

    /// Switch network: clear everything mirrored and the account.
    /// Returns the new network generation.
    pub fn reset_network(&self, network: Network, contracts: ContractAddresses) -> u64 {
        self.commit(|s, touched| {
            s.network = network;
            s.contracts = contracts;
            s.network_gen += 1;
            s.account = None;
            s.account_gen += 1;
            s.amount.clear();
            s.endpoint_connected = false;
            s.cursor = None;
            s.treasury_state = None;
            s.fees = None;
            s.times = None;
            s.lifecycle = Lifecycle::Idle;
            s.pending = None;
            s.notice = None;
            s.clear_account_data(touched);
            touched.extend([
                Field::Network,
                Field::Account,
                Field::Amount,
                Field::Endpoint,
                Field::Cursor,
                Field::Treasury,
                Field::Fees,
                Field::Times,
                Field::Lifecycle,
                Field::Notice,
            ]);
            s.network_gen
        })
    }

    /// Connect or disconnect an account. Returns the account generation.
    pub fn set_account(&self, account: Option<Address>) -> u64 {
        self.commit(|s, touched| {
            if s.account == account {
                return s.account_gen;
            }
            s.account = account;
            s.account_gen += 1;
            s.clear_account_data(touched);
            touched.push(Field::Account);
            if s.referrer.is_some() && s.referrer == s.account {
                s.referrer = None;
                touched.push(Field::Referrer);
            }
            s.account_gen
        })
    }

    pub fn set_visibility(&self, visible: bool) {
        self.commit(|s, touched| {
            if s.visible != visible {
                s.visible = visible;
                touched.push(Field::Visibility);
            }
        })
    }

    pub fn set_active_view(&self, view: View) {
        self.commit(|s, touched| {
            if s.active_view != view {
                s.active_view = view;
                touched.push(Field::ActiveView);
            }
        })
    }

    /// Switching tabs clears the amount input
    pub fn set_active_tab(&self, tab: Tab) {
        self.commit(|s, touched| {
            if s.active_tab != tab {
                s.active_tab = tab;
                s.amount.clear();
                touched.extend([Field::ActiveTab, Field::Amount]);
            }
        })
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        let amount = amount.into();
        self.commit(|s, touched| {
            if s.amount != amount {
                s.amount = amount;
                touched.push(Field::Amount);
            }
        })
    }

    /// Set the referrer; one equal to the connected account is dropped
    pub fn set_referrer(&self, referrer: Option<Address>) {
        self.commit(|s, touched| {
            let referrer = referrer.filter(|r| s.account.as_ref() != Some(r));
            if s.referrer != referrer {
                s.referrer = referrer;
                touched.push(Field::Referrer);
            }
        })
    }

    // --- mirrored state ---

    pub fn set_endpoint_connected(&self, network_gen: u64, connected: bool) -> Result<(), SyncError> {
        self.commit(|s, touched| {
            check_network(s, network_gen)?;
            if s.endpoint_connected != connected {
                s.endpoint_connected = connected;
                touched.push(Field::Endpoint);
            }
            Ok(())
        })
    }

    pub fn set_times(&self, network_gen: u64, times: Times) -> Result<(), SyncError> {
        self.commit(|s, touched| {
            check_network(s, network_gen)?;
            if s.times != Some(times) {
                s.times = Some(times);
                touched.push(Field::Times);
            }
            Ok(())
        })
    }

    /// Apply a snapshot as one write.
    ///
    /// Rejected without any change when it was read under another network or
    /// account generation, or at a height below the cursor.
    pub fn apply_snapshot(&self, snapshot: Snapshot) -> Result<(), SyncError> {
        self.commit(|s, touched| {
            check_network(s, snapshot.network_gen)?;
            if s.account_gen != snapshot.account_gen {
                return Err(SyncError::Superseded { what: "account" });
            }
            if let Some(cursor) = s.cursor {
                if snapshot.height < cursor {
                    return Err(SyncError::Stale {
                        height: snapshot.height,
                        cursor,
                    });
                }
            }

            if s.cursor != Some(snapshot.height) {
                s.cursor = Some(snapshot.height);
                touched.push(Field::Cursor);
            }
            if s.treasury_state.as_ref() != Some(&snapshot.treasury) {
                s.treasury_state = Some(snapshot.treasury);
                touched.push(Field::Treasury);
            }
            if s.fees != Some(snapshot.fees) {
                s.fees = Some(snapshot.fees);
                touched.push(Field::Fees);
            }
            if s.ton_balance != snapshot.ton_balance {
                s.ton_balance = snapshot.ton_balance;
                touched.push(Field::TonBalance);
            }

            let (address, state, fees) = match snapshot.wallet {
                Some(w) => (Some(w.address), Some(w.state), w.fees),
                None => (None, None, None),
            };
            if s.wallet_address != address || s.wallet_state != state {
                s.wallet_address = address;
                s.wallet_state = state;
                touched.push(Field::Wallet);
            }
            if s.wallet_fees != fees {
                s.wallet_fees = fees;
                touched.push(Field::WalletFees);
            }
            Ok(())
        })
    }

    pub fn set_legacy(
        &self,
        network_gen: u64,
        account_gen: u64,
        legacy: LegacyStatus,
    ) -> Result<(), SyncError> {
        self.commit(|s, touched| {
            check_network(s, network_gen)?;
            if s.account_gen != account_gen {
                return Err(SyncError::Superseded { what: "account" });
            }
            if s.legacy != legacy {
                s.legacy = legacy;
                touched.push(Field::Legacy);
            }
            Ok(())
        })
    }

    /// Forget the legacy result so the next cycle checks again
    pub fn reset_legacy(&self) {
        self.commit(|s, touched| {
            if s.legacy != LegacyStatus::Unchecked {
                s.legacy = LegacyStatus::Unchecked;
                touched.push(Field::Legacy);
            }
        })
    }

    // --- lifecycle ---

    /// Move to a lifecycle state. `pending` replaces the tracked operation
    /// when given; returning to `Idle` clears it.
    pub fn set_lifecycle(
        &self,
        network_gen: u64,
        lifecycle: Lifecycle,
        pending: Option<PendingOperation>,
    ) -> Result<(), SyncError> {
        self.commit(|s, touched| {
            check_network(s, network_gen)?;
            if s.lifecycle != lifecycle {
                s.lifecycle = lifecycle;
                touched.push(Field::Lifecycle);
            }
            if pending.is_some() || lifecycle == Lifecycle::Idle {
                s.pending = pending;
            }
            Ok(())
        })
    }

    /// Clear the amount input once an operation is signed
    pub fn clear_amount(&self) {
        self.set_amount(String::new());
    }

    // --- notices ---

    /// Show a notice, replacing any current one. Returns its id.
    pub fn show_notice(&self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        let id = self.notice_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let message = message.into();
        self.commit(|s, touched| {
            s.notice = Some(Notice { id, kind, message });
            touched.push(Field::Notice);
        });
        id
    }

    /// Clear the notice if it is still the one with `id`
    pub fn clear_notice(&self, id: u64) {
        self.commit(|s, touched| {
            if s.notice.as_ref().is_some_and(|n| n.id == id) {
                s.notice = None;
                touched.push(Field::Notice);
            }
        })
    }
}

fn check_network(state: &State, network_gen: u64) -> Result<(), SyncError> {
    if state.network_gen != network_gen {
        return Err(SyncError::Superseded { what: "network" });
    }
    Ok(())
}
