//! State root batches committed to L1.
//!
//! This crate provides:
//! - Batch header and batch types, converted to and from the ABI structs
//! - Traits for reading batches by index, with a StateCommitmentChain-backed
//!   implementation
//! - Binary search for the batch covering an L2 transaction index

pub mod locator;
pub mod source;
pub mod types;

pub use locator::find_batch_header_for_tx_index;
pub use source::{ChainBatchSource, IndexedEventSource, StateBatchSource, DEFAULT_LOGS_INTERVAL};
pub use types::{BatchError, StateRootBatch, StateRootBatchHeader};
