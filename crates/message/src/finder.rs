//! Discovery of messages emitted by the L2 messenger.

use crate::{
    encode::decode,
    types::{MessageError, SentMessage},
};
use alloy_contract::private::Provider;
use alloy_primitives::{Address, TxHash};
use alloy_rpc_types_eth::Log;
use alloy_sol_types::SolEvent;
use binding::ovm::IL2CrossDomainMessenger::{self, SentMessage as SentMessageEvent};
use std::future::Future;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, error, warn};

/// Blocks per `eth_getLogs` request.
const CHUNK_SIZE: u64 = 2_000;

/// Source of `SentMessage` events.
pub trait MessageSource: Send + Sync {
    /// Every message emitted in `[from_block, to_block]`, ordered by block
    /// then log index.
    fn sent_messages(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> impl Future<Output = Result<Vec<SentMessage>, MessageError>> + Send;

    /// The message emitted by one L2 transaction, if any.
    fn find_message_by_tx_hash(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<SentMessage>, MessageError>> + Send;
}

/// Build a [`SentMessage`] from a log, or `None` if the log is not a
/// `SentMessage` from `messenger`.
fn sent_message_from_log(log: &Log, messenger: Address) -> Result<Option<SentMessage>, MessageError> {
    if log.address() != messenger {
        return Ok(None);
    }
    let Ok(event) = SentMessageEvent::decode_log(&log.inner) else {
        return Ok(None);
    };

    Ok(Some(SentMessage {
        message: decode(&event.message)?,
        block_number: log.block_number.unwrap_or_default(),
        tx_hash: log.transaction_hash.unwrap_or_default(),
        log_index: log.log_index.unwrap_or_default(),
    }))
}

/// Pick the single message out of a transaction's logs.
fn single_message(
    tx_hash: TxHash,
    logs: &[Log],
    messenger: Address,
) -> Result<Option<SentMessage>, MessageError> {
    let mut messages = Vec::new();
    for log in logs {
        if let Some(message) = sent_message_from_log(log, messenger)? {
            messages.push(message);
        }
    }

    match messages.len() {
        0 | 1 => Ok(messages.pop()),
        count => Err(MessageError::UnsupportedMultiMessage { tx_hash, count }),
    }
}

/// Message source backed by an L2 node.
#[derive(Clone)]
pub struct ChainMessageSource<P> {
    provider: P,
    l2_messenger: Address,
}

impl<P> ChainMessageSource<P>
where
    P: Provider + Clone,
{
    pub const fn new(provider: P, l2_messenger: Address) -> Self {
        Self {
            provider,
            l2_messenger,
        }
    }

    /// Scan a single chunk with retry and exponential backoff.
    async fn scan_chunk_with_retry(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<SentMessage>, MessageError> {
        // 100ms, 200ms, 400ms, 800ms, 1.6s
        let retry_strategy = ExponentialBackoff::from_millis(100).take(5);

        Retry::spawn(retry_strategy, || async {
            self.scan_chunk(from_block, to_block).await.inspect_err(|e| {
                warn!(
                    from = from_block,
                    to = to_block,
                    error = %e,
                    "SentMessage scan failed, will retry"
                );
            })
        })
        .await
    }

    async fn scan_chunk(&self, from_block: u64, to_block: u64) -> Result<Vec<SentMessage>, MessageError> {
        let contract = IL2CrossDomainMessenger::new(self.l2_messenger, &self.provider);
        let events = contract
            .SentMessage_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query()
            .await
            .map_err(|e| MessageError::Rpc(e.to_string()))?;

        let mut messages = Vec::with_capacity(events.len());
        for (event, log) in events {
            match decode(&event.message) {
                Ok(message) => messages.push(SentMessage {
                    message,
                    block_number: log.block_number.unwrap_or_default(),
                    tx_hash: log.transaction_hash.unwrap_or_default(),
                    log_index: log.log_index.unwrap_or_default(),
                }),
                Err(e) => {
                    error!(
                        block = ?log.block_number,
                        tx_hash = ?log.transaction_hash,
                        error = %e,
                        "Skipping undecodable SentMessage"
                    );
                }
            }
        }

        Ok(messages)
    }
}

impl<P> MessageSource for ChainMessageSource<P>
where
    P: Provider + Clone,
{
    async fn sent_messages(&self, from_block: u64, to_block: u64) -> Result<Vec<SentMessage>, MessageError> {
        let mut all_messages = Vec::new();
        let mut current = from_block;

        while current <= to_block {
            let chunk_end = current.saturating_add(CHUNK_SIZE - 1).min(to_block);

            debug!(from = current, to = chunk_end, "Scanning chunk for sent messages");

            let chunk = self.scan_chunk_with_retry(current, chunk_end).await?;
            all_messages.extend(chunk);

            if chunk_end == u64::MAX {
                break;
            }
            current = chunk_end + 1;
        }

        all_messages.sort_by_key(|m| (m.block_number, m.log_index));
        Ok(all_messages)
    }

    async fn find_message_by_tx_hash(&self, tx_hash: TxHash) -> Result<Option<SentMessage>, MessageError> {
        let Some(receipt) = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| MessageError::Rpc(e.to_string()))?
        else {
            return Ok(None);
        };

        single_message(tx_hash, receipt.logs(), self.l2_messenger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode::encode, types::CrossChainMessage};
    use alloy_primitives::{address, b256, Bytes, U256};
    use binding::ovm::L2_MESSENGER_ADDRESS;

    const TX_HASH: TxHash =
        b256!("abababababababababababababababababababababababababababababababab");

    fn message(nonce: u64) -> CrossChainMessage {
        CrossChainMessage {
            target: address!("1111111111111111111111111111111111111111"),
            sender: address!("2222222222222222222222222222222222222222"),
            payload: Bytes::from_static(&[0xde, 0xad]),
            nonce: U256::from(nonce),
        }
    }

    fn sent_log(emitter: Address, message: &CrossChainMessage, log_index: u64) -> Log {
        let event = SentMessageEvent {
            message: encode(message),
        };
        Log {
            inner: alloy_primitives::Log {
                address: emitter,
                data: event.encode_log_data(),
            },
            block_number: Some(42),
            transaction_hash: Some(TX_HASH),
            log_index: Some(log_index),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_message_found() {
        let logs = vec![sent_log(L2_MESSENGER_ADDRESS, &message(3), 5)];
        let sent = single_message(TX_HASH, &logs, L2_MESSENGER_ADDRESS)
            .unwrap()
            .unwrap();

        assert_eq!(sent.message, message(3));
        assert_eq!(sent.block_number, 42);
        assert_eq!(sent.log_index, 5);
        assert_eq!(sent.tx_hash, TX_HASH);
    }

    #[test]
    fn test_other_emitters_ignored() {
        let impostor = address!("3333333333333333333333333333333333333333");
        let logs = vec![
            sent_log(impostor, &message(1), 0),
            sent_log(L2_MESSENGER_ADDRESS, &message(2), 1),
        ];

        let sent = single_message(TX_HASH, &logs, L2_MESSENGER_ADDRESS)
            .unwrap()
            .unwrap();
        assert_eq!(sent.message.nonce, U256::from(2));

        let logs = vec![sent_log(impostor, &message(1), 0)];
        assert_eq!(single_message(TX_HASH, &logs, L2_MESSENGER_ADDRESS), Ok(None));
    }

    #[test]
    fn test_multiple_messages_unsupported() {
        let logs = vec![
            sent_log(L2_MESSENGER_ADDRESS, &message(1), 0),
            sent_log(L2_MESSENGER_ADDRESS, &message(2), 1),
        ];

        assert_eq!(
            single_message(TX_HASH, &logs, L2_MESSENGER_ADDRESS),
            Err(MessageError::UnsupportedMultiMessage {
                tx_hash: TX_HASH,
                count: 2
            })
        );
    }

    #[test]
    fn test_no_logs() {
        assert_eq!(single_message(TX_HASH, &[], L2_MESSENGER_ADDRESS), Ok(None));
    }
}
