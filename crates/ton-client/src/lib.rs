//! ton-client: TON RPC access with timeouts and typed results
//!
//! This crate defines the interfaces the sync engine consumes (the chain
//! RPC, endpoint discovery, and the wallet-signing bridge) and wraps the
//! RPC in a [`NodeClient`] that applies request timeouts, maps get-method
//! exit codes to errors, and logs failures.

pub mod bridge;
pub mod discovery;
pub mod message;
pub mod stack;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hipo_core::{Address, BlockHeight, Nano, Network, NodeError, RpcConfig};

pub use bridge::{BridgeError, SignRequest, SigningBridge};
pub use discovery::{probe_endpoint, EndpointProvider, ProbeResult};
pub use message::{Message, MessageHeader, Transaction, TxCursor};
pub use stack::{StackReader, StackValue};

/// Result type for node client operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Raw outcome of a get-method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewResult {
    pub exit_code: i32,
    pub stack: Vec<StackValue>,
}

impl ViewResult {
    pub fn ok(stack: Vec<StackValue>) -> Self {
        Self {
            exit_code: 0,
            stack,
        }
    }
}

/// Blockchain RPC as provided by an endpoint
///
/// `height` pins a read to a specific masterchain block. `None` reads the
/// latest state (needed for get methods that access the network config).
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn latest_height(&self) -> Result<BlockHeight>;

    async fn call_view(
        &self,
        contract: &Address,
        height: Option<BlockHeight>,
        method: &str,
        args: &[StackValue],
    ) -> Result<ViewResult>;

    async fn account_balance(&self, address: &Address, height: BlockHeight) -> Result<Nano>;

    /// Most recent transactions first; `after` continues below a cursor
    async fn account_transactions(
        &self,
        address: &Address,
        after: Option<TxCursor>,
    ) -> Result<Vec<Transaction>>;
}

/// High-level client bound to one network's endpoint
#[derive(Clone)]
pub struct NodeClient {
    inner: Arc<dyn ChainRpc>,
    network: Network,
    timeout: Duration,
}

impl NodeClient {
    pub fn new(inner: Arc<dyn ChainRpc>, network: Network, config: &RpcConfig) -> Self {
        Self {
            inner,
            network,
            timeout: config.request_timeout(),
        }
    }

    /// Discover an endpoint for `network` and wrap it
    pub async fn connect(
        provider: &dyn EndpointProvider,
        network: Network,
        config: &RpcConfig,
    ) -> Result<Self> {
        let inner = timed_request(config.request_timeout(), provider.connect(network)).await?;
        tracing::info!(%network, "Connected to RPC endpoint");
        Ok(Self::new(inner, network, config))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Get the underlying RPC (for probing)
    pub fn inner(&self) -> &dyn ChainRpc {
        self.inner.as_ref()
    }

    /// Get latest masterchain block height
    pub async fn current_height(&self) -> Result<BlockHeight> {
        timed_request(self.timeout, self.inner.latest_height()).await
    }

    /// Check if the endpoint is answering
    pub async fn is_online(&self) -> bool {
        self.current_height().await.is_ok()
    }

    /// Run a get method and return a reader over its stack.
    /// Exit codes other than 0 and 1 become [`NodeError::ViewFailed`].
    pub async fn run_get_method(
        &self,
        contract: &Address,
        height: Option<BlockHeight>,
        method: &str,
        args: &[StackValue],
    ) -> Result<StackReader> {
        let result = timed_request(
            self.timeout,
            self.inner.call_view(contract, height, method, args),
        )
        .await
        .inspect_err(|e| {
            tracing::debug!(contract = %contract, method, error = %e, "Get method failed");
        })?;

        if result.exit_code != 0 && result.exit_code != 1 {
            return Err(NodeError::ViewFailed {
                method: method.to_string(),
                exit_code: result.exit_code,
            });
        }

        Ok(StackReader::new(method, result.stack))
    }

    /// Get account balance at a block height
    pub async fn account_balance(&self, address: &Address, height: BlockHeight) -> Result<Nano> {
        timed_request(self.timeout, self.inner.account_balance(address, height)).await
    }

    /// Get recent transactions for an account (most recent first)
    pub async fn recent_transactions(
        &self,
        address: &Address,
        after: Option<TxCursor>,
    ) -> Result<Vec<Transaction>> {
        timed_request(self.timeout, self.inner.account_transactions(address, after)).await
    }
}

/// Wrap an RPC call with a timeout
async fn timed_request<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| NodeError::Timeout {
            secs: timeout.as_secs(),
        })?
}
