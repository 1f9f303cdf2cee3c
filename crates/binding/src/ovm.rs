//! OVM contract bindings.
//!
//! Includes contracts for relaying L2→L1 messages:
//! - StateCommitmentChain (L1, batches of L2 state roots)
//! - L1CrossDomainMessenger (L1, verifies and executes relayed messages)
//! - Lib_AddressManager (L1, names the account allowed to relay)
//! - L2CrossDomainMessenger (L2 predeploy, emits sent messages)
//!
//! The L2ToL1MessagePasser predeploy is only read through storage proofs, so
//! it has an address here but no interface.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// L2ToL1MessagePasser predeploy address.
pub const MESSAGE_PASSER_ADDRESS: Address = address!("4200000000000000000000000000000000000000");

/// L2CrossDomainMessenger predeploy address.
pub const L2_MESSENGER_ADDRESS: Address = address!("4200000000000000000000000000000000000007");

sol! {
    /// Header of a batch of state roots appended to the StateCommitmentChain.
    #[derive(Debug, PartialEq, Eq)]
    struct ChainBatchHeader {
        uint256 batchIndex;
        bytes32 batchRoot;
        uint256 batchSize;
        uint256 prevTotalElements;
        bytes extraData;
    }

    /// Merkle path proving one element of a batch.
    #[derive(Debug, PartialEq, Eq)]
    struct ChainInclusionProof {
        uint256 index;
        bytes32[] siblings;
    }

    /// Proof bundle accepted by `L1CrossDomainMessenger.relayMessage`.
    #[derive(Debug, PartialEq, Eq)]
    struct L2MessageInclusionProof {
        bytes32 stateRoot;
        ChainBatchHeader stateRootBatchHeader;
        ChainInclusionProof stateRootProof;
        bytes stateTrieWitness;
        bytes storageTrieWitness;
    }

    /// StateCommitmentChain - L1 contract storing batches of L2 state roots
    #[sol(rpc)]
    interface IStateCommitmentChain {
        /// Emitted once per appended batch
        event StateBatchAppended(
            uint256 indexed _batchIndex,
            bytes32 _batchRoot,
            uint256 _batchSize,
            uint256 _prevTotalElements,
            bytes _extraData
        );

        /// Total number of batches appended so far
        function getTotalBatches() external view returns (uint256 _totalBatches);

        /// Whether a batch can still be challenged
        function insideFraudProofWindow(ChainBatchHeader memory _batchHeader)
            external view returns (bool _inside);

        /// Called by the proposer; its calldata carries the full list of state roots
        function appendStateBatch(bytes32[] calldata _batch, uint256 _shouldStartAtElement) external;
    }

    /// L1CrossDomainMessenger - executes L2→L1 messages once proven
    #[sol(rpc)]
    interface IL1CrossDomainMessenger {
        /// Relay a message sent from L2
        function relayMessage(
            address _target,
            address _sender,
            bytes memory _message,
            uint256 _messageNonce,
            L2MessageInclusionProof memory _proof
        ) external;

        /// Whether the message with this hash has been executed
        function successfulMessages(bytes32 _messageHash) external view returns (bool);
    }

    /// L2CrossDomainMessenger - L2 predeploy for sending messages to L1
    #[sol(rpc)]
    interface IL2CrossDomainMessenger {
        /// Emitted with the encoded `relayMessage` call for every sent message
        event SentMessage(bytes message);

        /// Target-side entry point; its calldata is the canonical message encoding
        function relayMessage(
            address _target,
            address _sender,
            bytes memory _message,
            uint256 _messageNonce
        ) external;
    }

    /// Lib_AddressManager - L1 name registry of the OVM deployment
    #[sol(rpc)]
    interface ILibAddressManager {
        /// Address registered under `_name`, zero if unset
        function getAddress(string memory _name) external view returns (address);
    }
}

/// Name under which the Lib_AddressManager registers the authorized relayer.
pub const L2_MESSAGE_RELAYER_NAME: &str = "OVM_L2MessageRelayer";

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{SolCall, SolEvent};

    #[test]
    fn test_l2_relay_message_selector() {
        // Canonical message encoding starts with this selector on every OVM chain.
        assert_eq!(
            IL2CrossDomainMessenger::relayMessageCall::SELECTOR,
            [0xcb, 0xd4, 0xec, 0xe9]
        );
    }

    #[test]
    fn test_event_signatures() {
        assert_eq!(
            IStateCommitmentChain::StateBatchAppended::SIGNATURE,
            "StateBatchAppended(uint256,bytes32,uint256,uint256,bytes)"
        );
        assert_eq!(
            IL2CrossDomainMessenger::SentMessage::SIGNATURE,
            "SentMessage(bytes)"
        );
    }

    #[test]
    fn test_address_manager_lookup_encoding() {
        let call = ILibAddressManager::getAddressCall {
            _name: L2_MESSAGE_RELAYER_NAME.to_string(),
        };
        assert_eq!(
            ILibAddressManager::getAddressCall::SIGNATURE,
            "getAddress(string)"
        );
        let decoded = ILibAddressManager::getAddressCall::abi_decode(&call.abi_encode()).unwrap();
        assert_eq!(decoded._name, "OVM_L2MessageRelayer");
    }
}
