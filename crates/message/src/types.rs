use alloy_primitives::{Address, Bytes, TxHash, U256};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    /// Only one SentMessage per transaction is supported
    #[error("Transaction {tx_hash} emitted {count} SentMessage events")]
    UnsupportedMultiMessage { tx_hash: TxHash, count: usize },

    /// Bytes that are not a `relayMessage` call
    #[error("Undecodable message: {0}")]
    UndecodableMessage(String),

    /// Error talking to the L2 node
    #[error("RPC error: {0}")]
    Rpc(String),
}

/// A message sent from L2 to L1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossChainMessage {
    /// Contract called on L1
    pub target: Address,
    /// L2 account that sent the message
    pub sender: Address,
    /// Calldata for the target
    pub payload: Bytes,
    /// Nonce assigned by the L2 messenger
    pub nonce: U256,
}

/// A message together with where it was emitted on L2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message: CrossChainMessage,
    pub block_number: u64,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

impl SentMessage {
    /// Index of the emitting transaction in the committed state root
    /// sequence. `None` for blocks before the first committed root.
    pub const fn tx_index(&self, block_offset: u64) -> Option<u64> {
        self.block_number.checked_sub(block_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_index_subtracts_offset() {
        let sent = SentMessage {
            message: CrossChainMessage {
                target: Address::ZERO,
                sender: Address::ZERO,
                payload: Bytes::new(),
                nonce: U256::ZERO,
            },
            block_number: 12,
            tx_hash: TxHash::ZERO,
            log_index: 0,
        };

        assert_eq!(sent.tx_index(1), Some(11));
        assert_eq!(sent.tx_index(0), Some(12));
        assert_eq!(sent.tx_index(13), None);
    }
}
