//! Transaction lifecycle tracking
//!
//! Hands a built intent to the signing bridge and then polls the account's
//! transaction history for the intent's opcode and correlation id: an
//! outgoing match means the message reached the network, an incoming match
//! means the treasury answered. Each submission ends in exactly one of
//! `Done` or `Timeout`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use hipo_core::{Address, CorrelationId, Error, TxError, UnixTime};
use hton::{OperationKind, TransactionIntent};
use rand::RngCore;
use ton_client::{BridgeError, MessageHeader, SigningBridge};
use tokio::task::JoinHandle;

use crate::context::SyncContext;
use crate::model::{Lifecycle, NoticeKind, PendingOperation};
use crate::scheduler::LoopJob;

/// Fresh correlation id from the OS random source
pub fn new_correlation_id() -> CorrelationId {
    CorrelationId(rand::rngs::OsRng.next_u64())
}

pub(crate) fn unix_now() -> UnixTime {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Clears the submitting flag however the submission ends
struct Submitting<'a>(&'a AtomicBool);

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TransactionTracker {
    ctx: Arc<SyncContext>,
    bridge: Arc<dyn SigningBridge>,
    /// Snapshot read run once an operation is done
    refresh: Arc<dyn LoopJob>,
    submitting: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionTracker {
    pub fn new(
        ctx: Arc<SyncContext>,
        bridge: Arc<dyn SigningBridge>,
        refresh: Arc<dyn LoopJob>,
    ) -> Self {
        Self {
            ctx,
            bridge,
            refresh,
            submitting: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Ask the bridge to sign `intent` and start tracking it.
    ///
    /// Rejection and bridge failure leave the lifecycle at `Idle`.
    pub async fn submit(self: &Arc<Self>, intent: TransactionIntent) -> Result<(), Error> {
        let store = &self.ctx.store;
        if store.read(|s| s.account.is_none()) {
            return Err(TxError::WalletNotConnected.into());
        }
        // The lifecycle is only read while holding the slot
        if self.submitting.swap(true, Ordering::SeqCst) {
            return Err(TxError::Busy.into());
        }
        let _submitting = Submitting(&self.submitting);

        let (network_gen, network, account, lifecycle) =
            store.read(|s| (s.network_gen, s.network, s.account.clone(), s.lifecycle));
        let account = account.ok_or(TxError::WalletNotConnected)?;
        if lifecycle != Lifecycle::Idle {
            return Err(TxError::Busy.into());
        }

        let request = intent.to_sign_request(
            &account,
            network,
            unix_now(),
            self.ctx.config.sync.send_valid_for_secs,
        );
        tracing::info!(
            kind = %intent.kind,
            correlation_id = %intent.correlation_id,
            amount = %intent.amount,
            "Requesting signature"
        );

        match self.bridge.request_signature(request).await {
            Ok(()) => {}
            Err(BridgeError::UserRejected) => {
                tracing::info!(correlation_id = %intent.correlation_id, "Signature rejected");
                return Err(TxError::UserRejected.into());
            }
            Err(BridgeError::Failed(message)) => {
                tracing::warn!(error = %message, "Signing bridge failed");
                self.ctx.notify_for(
                    NoticeKind::Bridge,
                    message.clone(),
                    self.ctx.config.sync.error_display(),
                );
                return Err(TxError::BridgeFailed { message }.into());
            }
        }

        store.clear_amount();
        let pending = PendingOperation {
            kind: intent.kind,
            correlation_id: intent.correlation_id,
            amount: intent.amount,
        };
        if let Err(e) = store.set_lifecycle(network_gen, Lifecycle::Signed, Some(pending)) {
            tracing::debug!(reason = %e, "Signed operation superseded");
            return Ok(());
        }

        let task = tokio::spawn(self.clone().track(
            network_gen,
            account,
            intent.kind,
            intent.header(),
        ));
        if let Some(old) = self.task_slot().replace(task) {
            old.abort();
        }
        Ok(())
    }

    fn task_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn track(
        self: Arc<Self>,
        network_gen: u64,
        account: Address,
        kind: OperationKind,
        header: MessageHeader,
    ) {
        let store = &self.ctx.store;
        let sync = &self.ctx.config.sync;
        let mut sent = false;

        for attempt in 1..=sync.tx_poll_attempts {
            tokio::time::sleep(sync.tx_poll_delay()).await;

            let Ok(client) = self.ctx.client(network_gen) else {
                continue;
            };
            let transactions = match client.current_height().await {
                Ok(_) => client.recent_transactions(&account, None).await,
                Err(e) => Err(e),
            };
            let transactions = match transactions {
                Ok(txs) => txs,
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Transaction poll failed");
                    continue;
                }
            };

            let outgoing = transactions.iter().any(|tx| tx.has_outgoing(&header));
            let incoming = transactions.iter().any(|tx| tx.has_incoming(&header));

            if !sent && (outgoing || incoming) {
                sent = true;
                tracing::info!(correlation_id = %header.correlation_id, attempt, "Operation sent");
                if store.set_lifecycle(network_gen, Lifecycle::Sent, None).is_err() {
                    return;
                }
            }
            if incoming {
                tracing::info!(correlation_id = %header.correlation_id, attempt, "Operation done");
                if store.set_lifecycle(network_gen, Lifecycle::Done, None).is_err() {
                    return;
                }
                if kind == OperationKind::Migrate {
                    store.reset_legacy();
                }
                if let Err(e) = self.refresh.run().await {
                    tracing::debug!(reason = %e, "Refresh after operation failed");
                }
                if let Err(e) = store.set_lifecycle(network_gen, Lifecycle::Idle, None) {
                    tracing::debug!(reason = %e, "Return to idle superseded");
                }
                return;
            }
        }

        tracing::warn!(
            correlation_id = %header.correlation_id,
            attempts = sync.tx_poll_attempts,
            "Operation not confirmed in time"
        );
        if let Err(e) = store.set_lifecycle(network_gen, Lifecycle::Timeout, None) {
            tracing::debug!(reason = %e, "Timeout superseded");
        }
    }

    /// Acknowledge a timeout and return to `Idle`
    pub fn dismiss_timeout(&self) -> Result<(), Error> {
        let store = &self.ctx.store;
        let (network_gen, lifecycle) = store.read(|s| (s.network_gen, s.lifecycle));
        if lifecycle != Lifecycle::Timeout {
            return Err(TxError::NothingToDismiss.into());
        }
        if let Err(e) = store.set_lifecycle(network_gen, Lifecycle::Idle, None) {
            tracing::debug!(reason = %e, "Dismissal superseded");
        }
        Ok(())
    }

    /// Stop tracking; used when the network is switched
    pub fn abort(&self) {
        if let Some(task) = self.task_slot().take() {
            task.abort();
        }
    }
}
