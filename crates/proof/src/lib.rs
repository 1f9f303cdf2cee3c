//! Proofs accepted by the L1 cross-domain messenger.
//!
//! - Merkle inclusion proofs of a state root within its batch
//! - Storage witnesses proving a message was recorded in L2 state

pub mod error;
pub mod merkle;
pub mod witness;

pub use error::ProofError;
pub use merkle::{build_inclusion_proof, compute_root, verify_inclusion_proof, MerkleProof, FILLER};
pub use witness::{classify_proof_error, ChainWitnessSource, StateTrieProof, WitnessSource};
