//! Hipo application library
//!
//! Hosts the sync engine behind the local HTTP API. The embedding shell
//! supplies the endpoint provider and the wallet's signing bridge.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use hipo_api::{start_server, AppState};
use hipo_core::AppConfig;
use hipo_sync::Engine;
use ton_client::{EndpointProvider, SigningBridge};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber; later calls are no-ops
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("hipo=debug".parse()?)
        .add_directive("info".parse()?);
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    Ok(())
}

/// Run the engine and serve the API until `shutdown` resolves
pub async fn run(
    config: AppConfig,
    provider: Arc<dyn EndpointProvider>,
    bridge: Arc<dyn SigningBridge>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    init_tracing()?;
    tracing::info!(network = %config.network, "Starting Hipo");

    let port = config.api_port;
    let engine = Engine::new(config, provider, bridge);
    engine.start();

    start_server(AppState::new(engine), port, shutdown)
        .await
        .with_context(|| format!("API server on port {}", port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hipo_core::{Network, NodeError};
    use ton_client::{BridgeError, ChainRpc, SignRequest};

    struct Offline;

    #[async_trait]
    impl EndpointProvider for Offline {
        async fn connect(&self, network: Network) -> Result<Arc<dyn ChainRpc>, NodeError> {
            Err(NodeError::Unreachable {
                network: network.to_string(),
            })
        }
    }

    struct NoWallet;

    #[async_trait]
    impl SigningBridge for NoWallet {
        async fn request_signature(&self, _request: SignRequest) -> Result<(), BridgeError> {
            Err(BridgeError::Failed("no wallet".to_string()))
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config = AppConfig {
            api_port: 0,
            ..AppConfig::default()
        };
        run(config, Arc::new(Offline), Arc::new(NoWallet), async {})
            .await
            .unwrap();
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing().unwrap();
        init_tracing().unwrap();
    }
}
