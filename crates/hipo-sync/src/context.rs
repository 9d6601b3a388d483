//! State shared by the loops, the tracker, and the engine

use std::sync::{Arc, RwLock};
use std::time::Duration;

use hipo_core::AppConfig;
use ton_client::NodeClient;

use crate::error::SyncError;
use crate::model::NoticeKind;
use crate::store::Store;

pub struct SyncContext {
    pub config: AppConfig,
    pub store: Arc<Store>,
    /// Client for the network generation it was connected under
    client: RwLock<Option<(u64, NodeClient)>>,
}

impl SyncContext {
    pub fn new(config: AppConfig, store: Arc<Store>) -> Self {
        Self {
            config,
            store,
            client: RwLock::new(None),
        }
    }

    /// The connected client, if it belongs to `network_gen`
    pub fn client(&self, network_gen: u64) -> Result<NodeClient, SyncError> {
        let slot = self.client.read().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some((gen, client)) if *gen == network_gen => Ok(client.clone()),
            _ => Err(SyncError::NotReady("endpoint")),
        }
    }

    /// The connected client for the current network
    pub fn current_client(&self) -> Result<NodeClient, SyncError> {
        self.client(self.store.read(|s| s.network_gen))
    }

    pub fn set_client(&self, network_gen: u64, client: NodeClient) {
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some((network_gen, client));
    }

    pub fn clear_client(&self) {
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Show a notice and clear it after `duration` unless replaced
    pub fn notify_for(&self, kind: NoticeKind, message: impl Into<String>, duration: Duration) {
        let id = self.store.show_notice(kind, message);
        let store = self.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            store.clear_notice(id);
        });
    }

    /// Transient failure notice, cleared just before the retry
    pub fn notify_transient(&self, message: impl Into<String>) {
        self.notify_for(NoticeKind::Transient, message, self.config.sync.error_display());
    }
}
