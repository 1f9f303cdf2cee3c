//! Storage witnesses from `eth_getProof`.

use crate::error::ProofError;
use alloy_primitives::{Address, Bytes, B256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::BlockNumberOrTag;
use std::future::Future;
use tracing::debug;

/// Account and storage proofs for one slot, each RLP-encoded as a list of
/// trie nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrieProof {
    pub account_proof: Bytes,
    pub storage_proof: Bytes,
}

impl StateTrieProof {
    /// Encode raw trie nodes as returned by `eth_getProof`.
    pub fn from_nodes(account_nodes: &[Bytes], storage_nodes: &[Bytes]) -> Self {
        Self {
            account_proof: alloy_rlp::encode(account_nodes.to_vec()).into(),
            storage_proof: alloy_rlp::encode(storage_nodes.to_vec()).into(),
        }
    }
}

/// Node errors meaning the state at the requested block is not served yet.
const UNAVAILABLE_STATE_ERRORS: [&str; 5] = [
    "missing trie node",
    "header not found",
    "unknown block",
    "historical state",
    "state not available",
];

/// Sort a failed `eth_getProof` into retry-later and hard failures.
pub fn classify_proof_error(block: u64, reason: String) -> ProofError {
    let lowered = reason.to_lowercase();
    if UNAVAILABLE_STATE_ERRORS
        .iter()
        .any(|pattern| lowered.contains(pattern))
    {
        ProofError::ProofUnavailable { block, reason }
    } else {
        ProofError::Rpc { block, reason }
    }
}

/// Produces storage witnesses against an L2 state.
pub trait WitnessSource: Send + Sync {
    /// Prove `slot` of `contract` at L2 block `block`.
    fn fetch_storage_witness(
        &self,
        block: u64,
        contract: Address,
        slot: B256,
    ) -> impl Future<Output = Result<StateTrieProof, ProofError>> + Send;
}

/// Witness source backed by an L2 node.
#[derive(Clone)]
pub struct ChainWitnessSource<P> {
    provider: P,
}

impl<P> ChainWitnessSource<P>
where
    P: Provider + Clone,
{
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P> WitnessSource for ChainWitnessSource<P>
where
    P: Provider + Clone,
{
    async fn fetch_storage_witness(
        &self,
        block: u64,
        contract: Address,
        slot: B256,
    ) -> Result<StateTrieProof, ProofError> {
        let response = self
            .provider
            .get_proof(contract, vec![slot])
            .block_id(BlockNumberOrTag::Number(block).into())
            .await
            .map_err(|e| classify_proof_error(block, e.to_string()))?;

        let storage = response
            .storage_proof
            .first()
            .ok_or_else(|| ProofError::Rpc {
                block,
                reason: "no storage proof returned".to_string(),
            })?;

        debug!(
            block,
            slot = %slot,
            account_nodes = response.account_proof.len(),
            storage_nodes = storage.proof.len(),
            "Fetched storage witness"
        );

        Ok(StateTrieProof::from_nodes(
            &response.account_proof,
            &storage.proof,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::hex;

    #[test]
    fn test_nodes_encoded_as_rlp_list() {
        let proof = StateTrieProof::from_nodes(&[Bytes::from_static(&[0x01, 0x02])], &[]);
        assert_eq!(proof.account_proof.as_ref(), hex!("c3820102"));
        assert_eq!(proof.storage_proof.as_ref(), hex!("c0"));
    }

    #[test]
    fn test_pruned_state_is_unavailable() {
        for reason in [
            "server returned an error response: error code -32000: missing trie node 1f2e3d (path )",
            "server returned an error response: error code -32000: header not found",
            "Unknown block",
            "required historical state unavailable (reexec=128)",
            "error code -32000: state not available",
        ] {
            assert!(
                matches!(
                    classify_proof_error(12, reason.to_string()),
                    ProofError::ProofUnavailable { block: 12, .. }
                ),
                "{reason}"
            );
        }
    }

    #[test]
    fn test_other_failures_are_rpc_errors() {
        for reason in [
            "error code -32601: the method eth_getProof does not exist/is not available",
            "error code -32602: invalid argument 1: hex string has length 62, want 64",
            "error sending request for url (http://localhost:8545/)",
        ] {
            assert_eq!(
                classify_proof_error(7, reason.to_string()),
                ProofError::Rpc {
                    block: 7,
                    reason: reason.to_string()
                }
            );
        }
    }
}
