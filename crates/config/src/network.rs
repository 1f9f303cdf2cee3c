//! Network configuration for message relaying.
//!
//! Provides chain ids, contract addresses and the L2 genesis offset for
//! different networks (mainnet, testnet, local devnet).

use alloy_primitives::Address;
use binding::ovm::{L2_MESSENGER_ADDRESS, MESSAGE_PASSER_ADDRESS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network type (mainnet, testnet or a local devnet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Local,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required contract address was left unset
    #[error("Missing contract address: {0}")]
    MissingAddress(&'static str),

    /// Chain id reported by an endpoint does not match the network
    #[error("Chain id mismatch on {layer}: expected {expected}, got {actual}")]
    ChainIdMismatch {
        layer: &'static str,
        expected: u64,
        actual: u64,
    },
}

/// L1 contracts the relayer reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Contracts {
    /// Chain ID
    pub chain_id: u64,
    /// StateCommitmentChain contract address
    pub state_commitment_chain: Address,
    /// L1CrossDomainMessenger (proxy) address
    pub l1_messenger: Address,
    /// First L1 block to scan for StateBatchAppended events
    pub start_block: u64,
    /// Lib_AddressManager that names the authorized relayer, if any
    pub address_manager: Option<Address>,
}

/// L2 predeploys and chain parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Contracts {
    /// Chain ID
    pub chain_id: u64,
    /// L2CrossDomainMessenger predeploy
    pub l2_messenger: Address,
    /// L2ToL1MessagePasser predeploy
    pub message_passer: Address,
    /// Number of L2 blocks that exist before the first committed state root.
    /// L2 block `n` carries transaction index `n - block_offset`.
    pub block_offset: u64,
}

impl L2Contracts {
    /// Standard predeploy addresses with the given chain id.
    pub const fn predeploys(chain_id: u64) -> Self {
        Self {
            chain_id,
            l2_messenger: L2_MESSENGER_ADDRESS,
            message_passer: MESSAGE_PASSER_ADDRESS,
            block_offset: 1,
        }
    }
}

/// Complete network configuration for relaying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network type
    pub network_type: NetworkType,
    /// L1 configuration
    pub l1: L1Contracts,
    /// L2 configuration
    pub l2: L2Contracts,
}

impl NetworkConfig {
    /// Check that every address the relayer needs has been provided.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("state_commitment_chain", self.l1.state_commitment_chain),
            ("l1_messenger", self.l1.l1_messenger),
            ("l2_messenger", self.l2.l2_messenger),
            ("message_passer", self.l2.message_passer),
        ];

        for (name, address) in required {
            if address == Address::ZERO {
                return Err(ConfigError::MissingAddress(name));
            }
        }

        Ok(())
    }

    /// Compare chain ids reported by the RPC endpoints against this network.
    pub const fn check_chain_ids(&self, l1_chain_id: u64, l2_chain_id: u64) -> Result<(), ConfigError> {
        if self.l1.chain_id != l1_chain_id {
            return Err(ConfigError::ChainIdMismatch {
                layer: "L1",
                expected: self.l1.chain_id,
                actual: l1_chain_id,
            });
        }
        if self.l2.chain_id != l2_chain_id {
            return Err(ConfigError::ChainIdMismatch {
                layer: "L2",
                expected: self.l2.chain_id,
                actual: l2_chain_id,
            });
        }
        Ok(())
    }
}

/// Builder for network configurations.
///
/// L1 contract addresses are deployment specific and start out unset;
/// [`NetworkConfig::validate`] rejects a configuration that never set them.
#[derive(Debug, Clone)]
pub struct NetworkConfigBuilder {
    network_type: NetworkType,
    l1: L1Contracts,
    l2: L2Contracts,
}

impl NetworkConfigBuilder {
    /// Start with defaults for the given network type.
    pub const fn new(network_type: NetworkType) -> Self {
        let (l1_chain_id, l2_chain_id) = match network_type {
            NetworkType::Mainnet => (1, 10),
            NetworkType::Testnet => (42, 69),
            NetworkType::Local => (31337, 420),
        };

        Self {
            network_type,
            l1: L1Contracts {
                chain_id: l1_chain_id,
                state_commitment_chain: Address::ZERO,
                l1_messenger: Address::ZERO,
                start_block: 0,
                address_manager: None,
            },
            l2: L2Contracts::predeploys(l2_chain_id),
        }
    }

    /// Set the StateCommitmentChain address.
    pub const fn state_commitment_chain(mut self, address: Address) -> Self {
        self.l1.state_commitment_chain = address;
        self
    }

    /// Set the L1CrossDomainMessenger address.
    pub const fn l1_messenger(mut self, address: Address) -> Self {
        self.l1.l1_messenger = address;
        self
    }

    /// Set the first L1 block to scan for batch events.
    pub const fn l1_start_block(mut self, block: u64) -> Self {
        self.l1.start_block = block;
        self
    }

    /// Override the L2CrossDomainMessenger address.
    pub const fn l2_messenger(mut self, address: Address) -> Self {
        self.l2.l2_messenger = address;
        self
    }

    /// Override the L2ToL1MessagePasser address.
    pub const fn message_passer(mut self, address: Address) -> Self {
        self.l2.message_passer = address;
        self
    }

    /// Override the L2 genesis block offset.
    pub const fn block_offset(mut self, offset: u64) -> Self {
        self.l2.block_offset = offset;
        self
    }

    /// Set the Lib_AddressManager checked for the authorized relayer.
    pub const fn address_manager(mut self, address: Address) -> Self {
        self.l1.address_manager = Some(address);
        self
    }

    /// Override the L1 chain id of the preset.
    pub const fn l1_chain_id(mut self, chain_id: u64) -> Self {
        self.l1.chain_id = chain_id;
        self
    }

    /// Override the L2 chain id of the preset.
    pub const fn l2_chain_id(mut self, chain_id: u64) -> Self {
        self.l2.chain_id = chain_id;
        self
    }

    /// Build the network configuration.
    pub const fn build(self) -> NetworkConfig {
        NetworkConfig {
            network_type: self.network_type,
            l1: self.l1,
            l2: self.l2,
        }
    }
}
