//! Merkle tree over the state roots of one batch.
//!
//! Leaves are the state roots themselves (not hashed again). The leaf list is
//! padded on the right with [`FILLER`] up to the next power of two and each
//! parent is `keccak256(left ++ right)`. This matches the tree the
//! StateCommitmentChain builds when a batch is appended.

use crate::error::ProofError;
use alloy_primitives::{b256, keccak256, B256};

/// Padding leaf: `keccak256(bytes32(0))`.
pub const FILLER: B256 = b256!("290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563");

/// Sibling path from one leaf up to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Position of the leaf in the (unpadded) leaf list
    pub index: u64,
    /// Sibling hashes, leaf level first
    pub siblings: Vec<B256>,
}

fn hash_pair(left: &B256, right: &B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

fn padded_leaves(leaves: &[B256]) -> Result<Vec<B256>, ProofError> {
    if leaves.is_empty() {
        return Err(ProofError::EmptyTree);
    }
    let mut layer = leaves.to_vec();
    layer.resize(leaves.len().next_power_of_two(), FILLER);
    Ok(layer)
}

fn next_layer(layer: &[B256]) -> Vec<B256> {
    layer
        .chunks_exact(2)
        .map(|pair| hash_pair(&pair[0], &pair[1]))
        .collect()
}

/// Root of the padded tree over `leaves`.
pub fn compute_root(leaves: &[B256]) -> Result<B256, ProofError> {
    let mut layer = padded_leaves(leaves)?;
    while layer.len() > 1 {
        layer = next_layer(&layer);
    }
    Ok(layer[0])
}

/// Build the sibling path for `leaves[index]`.
///
/// A single leaf is its own root and gets an empty path.
pub fn build_inclusion_proof(leaves: &[B256], index: u64) -> Result<MerkleProof, ProofError> {
    let mut layer = padded_leaves(leaves)?;
    if index >= leaves.len() as u64 {
        return Err(ProofError::InvalidLeafIndex {
            index,
            leaves: leaves.len(),
        });
    }

    let mut siblings = Vec::with_capacity(layer.len().trailing_zeros() as usize);
    let mut position = index as usize;

    while layer.len() > 1 {
        siblings.push(layer[position ^ 1]);
        layer = next_layer(&layer);
        position /= 2;
    }

    Ok(MerkleProof { index, siblings })
}

/// Check that `leaf` sits at `proof.index` under `root`.
pub fn verify_inclusion_proof(leaf: B256, proof: &MerkleProof, root: B256) -> bool {
    let mut node = leaf;
    let mut position = proof.index;

    for sibling in &proof.siblings {
        node = if position & 1 == 0 {
            hash_pair(&node, sibling)
        } else {
            hash_pair(sibling, &node)
        };
        position >>= 1;
    }

    position == 0 && node == root
}
