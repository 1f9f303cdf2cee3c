//! Configuration types for the message relayer.
//!
//! This crate provides:
//! - Network presets (mainnet, testnet, local devnet)
//! - Contract addresses for L1 and the L2 predeploys
//! - Validation of a configured network before the relay loop starts

pub mod network;

pub use network::{
    ConfigError, L1Contracts, L2Contracts, NetworkConfig, NetworkConfigBuilder, NetworkType,
};
