use alloy_primitives::Address;
use config::{NetworkConfig, NetworkConfigBuilder, NetworkType};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

const fn default_polling_interval_ms() -> u64 {
    5_000
}

const fn default_l2_block_offset() -> u64 {
    1
}

const fn default_relay_gas_limit() -> u64 {
    4_000_000
}

const fn default_get_logs_interval() -> u64 {
    batch::DEFAULT_LOGS_INTERVAL
}

/// Contract addresses that replace the network defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractOverrides {
    /// StateCommitmentChain on L1
    pub state_commitment_chain: Option<Address>,
    /// L1CrossDomainMessenger (proxy) on L1
    pub l1_messenger: Option<Address>,
    /// L2CrossDomainMessenger on L2
    pub l2_messenger: Option<Address>,
    /// L2ToL1MessagePasser on L2
    pub message_passer: Option<Address>,
    /// Lib_AddressManager on L1, checked for the registered relayer
    pub address_manager: Option<Address>,
}

/// Top-level relayer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// L1 RPC endpoint url
    pub l1_rpc_url: String,

    /// L2 RPC endpoint url
    pub l2_rpc_url: String,

    /// Network preset for chain ids and predeploys
    pub network: NetworkType,

    /// L1 chain id, replacing the preset's
    #[serde(default)]
    pub l1_chain_id: Option<u64>,

    /// L2 chain id, replacing the preset's
    #[serde(default)]
    pub l2_chain_id: Option<u64>,

    /// Contract addresses; the L1 ones are required
    #[serde(default)]
    pub contracts: ContractOverrides,

    /// Delay between polls while waiting for batches or finality
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// L2 blocks before the first committed state root
    #[serde(default = "default_l2_block_offset")]
    pub l2_block_offset: u64,

    /// Batch index the relay loop starts from
    #[serde(default)]
    pub start_batch_index: u64,

    /// First L1 block to scan for StateBatchAppended events
    #[serde(default)]
    pub l1_start_block: u64,

    /// L1 blocks per eth_getLogs request when scanning for batches
    #[serde(default = "default_get_logs_interval")]
    pub get_logs_interval: u64,

    /// Gas limit for relay transactions
    #[serde(default = "default_relay_gas_limit")]
    pub relay_gas_limit: u64,

    /// Port for the Prometheus exporter; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Simulate relays without sending transactions
    #[serde(default)]
    pub dry_run: bool,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> eyre::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        Ok(config)
    }

    /// Network preset with the configured overrides applied.
    pub fn network_config(&self) -> NetworkConfig {
        let mut builder = NetworkConfigBuilder::new(self.network)
            .block_offset(self.l2_block_offset)
            .l1_start_block(self.l1_start_block);

        if let Some(chain_id) = self.l1_chain_id {
            builder = builder.l1_chain_id(chain_id);
        }
        if let Some(chain_id) = self.l2_chain_id {
            builder = builder.l2_chain_id(chain_id);
        }

        let contracts = &self.contracts;
        if let Some(address) = contracts.address_manager {
            builder = builder.address_manager(address);
        }
        if let Some(address) = contracts.state_commitment_chain {
            builder = builder.state_commitment_chain(address);
        }
        if let Some(address) = contracts.l1_messenger {
            builder = builder.l1_messenger(address);
        }
        if let Some(address) = contracts.l2_messenger {
            builder = builder.l2_messenger(address);
        }
        if let Some(address) = contracts.message_passer {
            builder = builder.message_passer(address);
        }

        builder.build()
    }

    pub const fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Reject configurations the relay loop cannot run with.
    pub fn validate(&self) -> eyre::Result<()> {
        for (name, url) in [("l1_rpc_url", &self.l1_rpc_url), ("l2_rpc_url", &self.l2_rpc_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                eyre::bail!("{name} must be an http(s) URL, got {url:?}");
            }
        }
        if self.polling_interval_ms == 0 {
            eyre::bail!("polling_interval_ms must be positive");
        }
        if self.get_logs_interval == 0 {
            eyre::bail!("get_logs_interval must be positive");
        }
        if self.relay_gas_limit == 0 {
            eyre::bail!("relay_gas_limit must be positive");
        }
        self.network_config().validate()?;
        Ok(())
    }
}
