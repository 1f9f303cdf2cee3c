//! Canonical message encoding.
//!
//! A message is encoded as the calldata of
//! `relayMessage(address,address,bytes,uint256)` on the L2 messenger. These are
//! the bytes the messenger emits in `SentMessage` and hands to the L2 message
//! passer, so the hash and storage slot below must match them exactly.

use crate::types::{CrossChainMessage, MessageError};
use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::SolCall;
use binding::ovm::IL2CrossDomainMessenger::relayMessageCall;

/// Encode a message into its canonical bytes.
pub fn encode(message: &CrossChainMessage) -> Bytes {
    relayMessageCall {
        _target: message.target,
        _sender: message.sender,
        _message: message.payload.clone(),
        _messageNonce: message.nonce,
    }
    .abi_encode()
    .into()
}

/// Decode canonical bytes back into a message.
pub fn decode(data: &[u8]) -> Result<CrossChainMessage, MessageError> {
    let call = relayMessageCall::abi_decode_validate(data)
        .map_err(|e| MessageError::UndecodableMessage(e.to_string()))?;

    Ok(CrossChainMessage {
        target: call._target,
        sender: call._sender,
        payload: call._message,
        nonce: call._messageNonce,
    })
}

/// Identity of a message: `keccak256(encode(message))`.
///
/// This is the key of `successfulMessages` on the L1 messenger.
pub fn message_hash(message: &CrossChainMessage) -> B256 {
    keccak256(encode(message))
}

/// Storage slot in the L2 message passer that records `message`.
///
/// The passer keys `sentMessages` by `keccak256(message ++ msg.sender)`, and
/// the sender is always the L2 messenger. The mapping sits at slot 0.
pub fn storage_slot(message: &CrossChainMessage, messenger: Address) -> B256 {
    let mut key_preimage = encode(message).to_vec();
    key_preimage.extend_from_slice(messenger.as_slice());
    let key = keccak256(&key_preimage);

    let mut slot_preimage = [0u8; 64];
    slot_preimage[..32].copy_from_slice(key.as_slice());
    keccak256(slot_preimage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, bytes, hex, U256};
    use binding::ovm::L2_MESSENGER_ADDRESS;

    fn fixture() -> CrossChainMessage {
        CrossChainMessage {
            target: address!("1111111111111111111111111111111111111111"),
            sender: address!("2222222222222222222222222222222222222222"),
            payload: bytes!("deadbeef"),
            nonce: U256::from(7),
        }
    }

    #[test]
    fn test_encoding_layout() {
        let encoded = encode(&fixture());
        assert_eq!(&encoded[..4], hex!("cbd4ece9"));
        // selector + 4 head words + length word + one padded data word
        assert_eq!(encoded.len(), 4 + 32 * 6);
        assert_eq!(&encoded[4 + 32 * 5..4 + 32 * 5 + 4], hex!("deadbeef"));
    }

    #[test]
    fn test_message_hash_fixture() {
        assert_eq!(
            message_hash(&fixture()),
            b256!("40a388516ca550449f74cff7b9315f4245bc8160d992012dd5aef4f02ee5909b")
        );
    }

    #[test]
    fn test_storage_slot_fixture() {
        assert_eq!(
            storage_slot(&fixture(), L2_MESSENGER_ADDRESS),
            b256!("aa370ba2c38d0f9e565ad4a42ac2a957684e91b315feeb263e5a441c5c1a16da")
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let message = fixture();
        let encoded = encode(&message);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(encode(&decoded), encoded);
    }

    #[test]
    fn test_empty_payload() {
        let message = CrossChainMessage {
            payload: Bytes::new(),
            nonce: U256::ZERO,
            ..fixture()
        };

        assert_eq!(decode(&encode(&message)).unwrap(), message);
        assert_eq!(
            message_hash(&message),
            b256!("f0b39389f3721eb96600e2e2abc1b9ef745fd67a84229371ba27d9b7e9b05ca7")
        );
    }

    #[test]
    fn test_decode_rejects_foreign_bytes() {
        let mut encoded = encode(&fixture()).to_vec();
        encoded[0] ^= 0xff;
        assert!(matches!(
            decode(&encoded),
            Err(MessageError::UndecodableMessage(_))
        ));

        let encoded = encode(&fixture());
        assert!(decode(&encoded[..40]).is_err());
        assert!(decode(&[]).is_err());
    }
}
