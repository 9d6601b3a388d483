//! Hipo Protocol Constants
//!
//! Contract addresses, operation codes, and protocol parameters for mainnet and testnet.

use hipo_core::{Address, ContractOverrides, Network};

/// Mainnet contract addresses
pub mod mainnet {
    /// Treasury (hTON jetton master)
    pub const TREASURY_ADDRESS: &str = "EQBNo5qAG8I8J6IxGaz15SfQVB-kX98YhKV_mT36Xo5vYxUa";

    /// Explorer page prefix for jettons
    pub const EXPLORER_JETTON_URL: &str = "https://tonscan.org/jetton/";
}

/// Testnet contract addresses
pub mod testnet {
    pub const TREASURY_ADDRESS: &str = "kQAjvBlA6Gt0BZhvM9_PgBDVv1_EkRuMYZ3XxdaXlKRyCeaI";

    pub const EXPLORER_JETTON_URL: &str = "https://testnet.tonscan.org/jetton/";
}

/// Operation codes (first 32 bits of a message body)
pub mod op {
    pub const DEPOSIT_COINS: u32 = 0x3d3761a6;
    pub const UNSTAKE_TOKENS: u32 = 0x595f07bc;
    pub const UPGRADE_WALLET: u32 = 0x01f3835d;
}

/// Protocol parameters
pub mod params {
    use hipo_core::{Nano, UnixTime};

    /// Kept in the user's wallet for its own storage fee when staking the maximum (0.1 TON)
    pub const STAKE_RESERVE: Nano = 100_000_000;

    /// Unstake fee assumed for wallets that predate `get_wallet_fees` (0.135 TON)
    pub const LEGACY_UNSTAKE_TOKENS_FEE: Nano = 135_000_000;

    /// Storage fee assumed for wallets that predate `get_wallet_fees` (0.04 TON)
    pub const LEGACY_STORAGE_FEE: Nano = 40_000_000;

    /// Value attached to a legacy wallet upgrade (0.2 TON)
    pub const UPGRADE_WALLET_FEE: Nano = 200_000_000;

    /// `governance_fee` is a fraction of this denominator
    pub const GOVERNANCE_FEE_DENOMINATOR: u64 = 65_535;

    /// Gap added to every release time estimate
    pub const ETA_MARGIN_SECS: UnixTime = 5 * 60;

    /// Exit code of a get method that does not exist in the deployed code
    pub const EXIT_CODE_METHOD_NOT_FOUND: i32 = 11;
}

/// Contract addresses for a specific network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAddresses {
    pub treasury: Address,
    /// Deprecated predecessor treasury, if one exists on this network
    pub legacy_treasury: Option<Address>,
}

impl ContractAddresses {
    /// Get contract addresses for a network, applying configured overrides
    pub fn for_network(network: Network, overrides: &ContractOverrides) -> Self {
        let default_treasury = match network {
            Network::Mainnet => mainnet::TREASURY_ADDRESS,
            Network::Testnet => testnet::TREASURY_ADDRESS,
        };
        Self {
            treasury: overrides
                .treasury
                .clone()
                .unwrap_or_else(|| Address::new(default_treasury)),
            legacy_treasury: overrides.legacy_treasury.clone(),
        }
    }

    /// Explorer link to the hTON jetton
    pub fn explorer_href(&self, network: Network) -> String {
        let prefix = match network {
            Network::Mainnet => mainnet::EXPLORER_JETTON_URL,
            Network::Testnet => testnet::EXPLORER_JETTON_URL,
        };
        format!("{}{}", prefix, self.treasury)
    }
}
