//! Endpoint discovery and probing
//!
//! Discovery hands out a [`ChainRpc`] for the selected network; probing
//! checks that an endpoint answers and measures its latency.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hipo_core::{BlockHeight, Network, NodeError};
use serde::Serialize;

use crate::ChainRpc;

/// Source of RPC endpoints (e.g. a decentralised access gateway)
#[async_trait]
pub trait EndpointProvider: Send + Sync {
    async fn connect(&self, network: Network) -> Result<Arc<dyn ChainRpc>, NodeError>;
}

/// Result of probing an endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub network: Network,
    pub chain_height: BlockHeight,
    pub latency_ms: u64,
}

/// Probe an endpoint by asking for its latest block. Returns None on
/// failure or when the endpoint does not answer within `timeout`.
pub async fn probe_endpoint(
    rpc: &dyn ChainRpc,
    network: Network,
    timeout: Duration,
) -> Option<ProbeResult> {
    let start = Instant::now();
    let height = tokio::time::timeout(timeout, rpc.latest_height())
        .await
        .ok()?
        .ok()?;

    Some(ProbeResult {
        network,
        chain_height: height,
        latency_ms: start.elapsed().as_millis() as u64,
    })
}
