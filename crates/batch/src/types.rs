use alloy_primitives::{Bytes, TxHash, B256, U256};
use binding::ovm::{ChainBatchHeader, IStateCommitmentChain::StateBatchAppended};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    /// A uint256 header field that does not fit in u64
    #[error("Header field {field} out of range: {value}")]
    ValueOutOfRange { field: &'static str, value: U256 },

    /// The appendStateBatch calldata could not be decoded or does not match the header
    #[error("Malformed appendStateBatch calldata for batch {batch_index}: {reason}")]
    MalformedCalldata { batch_index: u64, reason: String },

    /// More than one StateBatchAppended event for a single index
    #[error("Found {count} StateBatchAppended events for batch {batch_index}")]
    DuplicateEvent { batch_index: u64, count: usize },

    /// The source reports a total but has no header for an index below it
    #[error("No header for batch {batch_index} although {total} batches exist")]
    MissingHeader { batch_index: u64, total: u64 },

    /// No StateBatchAppended event exists for the batch
    #[error("No StateBatchAppended event for batch {0}")]
    UnknownBatch(u64),

    /// The event carried no transaction hash, or the transaction is gone
    #[error("Transaction for batch {batch_index} not found: {tx_hash:?}")]
    TransactionNotFound {
        batch_index: u64,
        tx_hash: Option<TxHash>,
    },

    /// Error talking to the L1 node
    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Header of a batch of L2 state roots, as emitted by `StateBatchAppended`.
///
/// The batch covers L2 transaction indices
/// `[prev_total_elements, prev_total_elements + batch_size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRootBatchHeader {
    pub batch_index: u64,
    pub batch_root: B256,
    pub batch_size: u64,
    pub prev_total_elements: u64,
    pub extra_data: Bytes,
}

impl StateRootBatchHeader {
    /// One past the last L2 transaction index in this batch.
    pub const fn end(&self) -> u64 {
        self.prev_total_elements.saturating_add(self.batch_size)
    }

    /// Whether the batch commits the state root for `tx_index`.
    pub const fn covers(&self, tx_index: u64) -> bool {
        tx_index >= self.prev_total_elements && tx_index < self.end()
    }

    /// Position of `tx_index` inside this batch.
    pub const fn index_in_batch(&self, tx_index: u64) -> Option<u64> {
        if self.covers(tx_index) {
            Some(tx_index - self.prev_total_elements)
        } else {
            None
        }
    }

    /// Inclusive L2 block range whose state roots this batch commits.
    ///
    /// `block_offset` is the number of L2 blocks before the first committed
    /// state root. Returns `None` for an empty batch.
    pub const fn l2_block_range(&self, block_offset: u64) -> Option<(u64, u64)> {
        if self.batch_size == 0 {
            return None;
        }
        let start = self.prev_total_elements + block_offset;
        Some((start, start + self.batch_size - 1))
    }

    /// Convert into the struct passed to the L1 contracts.
    pub fn to_abi(&self) -> ChainBatchHeader {
        ChainBatchHeader {
            batchIndex: U256::from(self.batch_index),
            batchRoot: self.batch_root,
            batchSize: U256::from(self.batch_size),
            prevTotalElements: U256::from(self.prev_total_elements),
            extraData: self.extra_data.clone(),
        }
    }
}

impl TryFrom<&StateBatchAppended> for StateRootBatchHeader {
    type Error = BatchError;

    fn try_from(event: &StateBatchAppended) -> Result<Self, Self::Error> {
        Ok(Self {
            batch_index: to_u64("batchIndex", event._batchIndex)?,
            batch_root: event._batchRoot,
            batch_size: to_u64("batchSize", event._batchSize)?,
            prev_total_elements: to_u64("prevTotalElements", event._prevTotalElements)?,
            extra_data: event._extraData.clone(),
        })
    }
}

impl TryFrom<&ChainBatchHeader> for StateRootBatchHeader {
    type Error = BatchError;

    fn try_from(header: &ChainBatchHeader) -> Result<Self, Self::Error> {
        Ok(Self {
            batch_index: to_u64("batchIndex", header.batchIndex)?,
            batch_root: header.batchRoot,
            batch_size: to_u64("batchSize", header.batchSize)?,
            prev_total_elements: to_u64("prevTotalElements", header.prevTotalElements)?,
            extra_data: header.extraData.clone(),
        })
    }
}

fn to_u64(field: &'static str, value: U256) -> Result<u64, BatchError> {
    u64::try_from(value).map_err(|_| BatchError::ValueOutOfRange { field, value })
}

/// A batch header together with the state roots it commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRootBatch {
    pub header: StateRootBatchHeader,
    pub state_roots: Vec<B256>,
}

impl StateRootBatch {
    /// Pair a header with its roots, rejecting a root count that disagrees
    /// with the header.
    pub fn new(header: StateRootBatchHeader, state_roots: Vec<B256>) -> Result<Self, BatchError> {
        if state_roots.len() as u64 != header.batch_size {
            return Err(BatchError::MalformedCalldata {
                batch_index: header.batch_index,
                reason: format!(
                    "expected {} state roots, found {}",
                    header.batch_size,
                    state_roots.len()
                ),
            });
        }
        Ok(Self {
            header,
            state_roots,
        })
    }
}
