//! Configuration types for Hipo

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Address, Error, Network};

/// RPC endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Per-request timeout applied to every RPC call (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Polling cadences and retry budgets (milliseconds unless noted)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Endpoint discovery / health check cadence
    pub discovery_interval_ms: u64,
    /// Round timing (`get_times`) cadence
    pub times_interval_ms: u64,
    /// Block snapshot cadence
    pub snapshot_interval_ms: u64,
    /// Delay before a failed loop runs again
    pub retry_delay_ms: u64,
    /// Delay between confirmation polls of a submitted operation
    pub tx_poll_delay_ms: u64,
    /// Number of confirmation polls before giving up
    pub tx_poll_attempts: u32,
    /// Validity window of a signing request (seconds)
    pub send_valid_for_secs: u64,
    /// How long a network mismatch notice stays visible
    pub mismatch_notice_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            discovery_interval_ms: 30_000,
            times_interval_ms: 60_000,
            snapshot_interval_ms: 6_000,
            retry_delay_ms: 3_000,
            tx_poll_delay_ms: 1_000,
            tx_poll_attempts: 60,
            send_valid_for_secs: 5 * 60,
            mismatch_notice_ms: 10_000,
        }
    }
}

impl SyncConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn times_interval(&self) -> Duration {
        Duration::from_millis(self.times_interval_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Transient notices clear just before the retry fires
    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_sub(500))
    }

    pub fn tx_poll_delay(&self) -> Duration {
        Duration::from_millis(self.tx_poll_delay_ms)
    }

    pub fn mismatch_notice(&self) -> Duration {
        Duration::from_millis(self.mismatch_notice_ms)
    }
}

/// Per-network contract address overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractOverrides {
    #[serde(default)]
    pub treasury: Option<Address>,
    #[serde(default)]
    pub legacy_treasury: Option<Address>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network selected at startup
    #[serde(default)]
    pub network: Network,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub mainnet: ContractOverrides,

    #[serde(default)]
    pub testnet: ContractOverrides,
}

fn default_api_port() -> u16 {
    19054
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            rpc: RpcConfig::default(),
            sync: SyncConfig::default(),
            api_port: default_api_port(),
            mainnet: ContractOverrides::default(),
            testnet: ContractOverrides::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Contract overrides for a network
    pub fn contracts(&self, network: Network) -> &ContractOverrides {
        match network {
            Network::Mainnet => &self.mainnet,
            Network::Testnet => &self.testnet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.api_port, 19054);
        assert_eq!(config.sync.snapshot_interval(), Duration::from_secs(6));
        assert_eq!(config.sync.error_display(), Duration::from_millis(2_500));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rpc.request_timeout_ms, config.rpc.request_timeout_ms);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"network":"testnet","sync":{"tx_poll_attempts":5}}"#).unwrap();
        assert_eq!(parsed.network, Network::Testnet);
        assert_eq!(parsed.sync.tx_poll_attempts, 5);
        assert_eq!(parsed.sync.retry_delay_ms, 3_000);
        assert!(parsed.contracts(Network::Testnet).legacy_treasury.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/hipo.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
