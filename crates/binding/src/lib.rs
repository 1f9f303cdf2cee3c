//! Contract bindings for all external contracts.
//!
//! This crate consolidates the Solidity interfaces the relayer talks to:
//! - L1 rollup contracts (StateCommitmentChain, L1CrossDomainMessenger)
//! - L2 predeploys (L2CrossDomainMessenger, L2ToL1MessagePasser)
//!
//! All bindings are generated using alloy's `sol!` macro.

pub mod ovm;
