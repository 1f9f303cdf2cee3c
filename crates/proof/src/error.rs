use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// A tree needs at least one leaf
    #[error("Cannot build a Merkle tree without leaves")]
    EmptyTree,

    /// Leaf index past the end of the leaf list
    #[error("Leaf index {index} out of range for {leaves} leaves")]
    InvalidLeafIndex { index: u64, leaves: usize },

    /// The node could not produce a storage proof at this block; retry later
    #[error("Storage proof unavailable at L2 block {block}: {reason}")]
    ProofUnavailable { block: u64, reason: String },

    /// `eth_getProof` failed for a reason waiting will not fix
    #[error("Storage proof request failed at L2 block {block}: {reason}")]
    Rpc { block: u64, reason: String },
}
