//! Relaying single messages.

use action::relay::{assemble_relay, L1Messenger, ProofParams, Relay, RelayAction, RelayOutcome};
use alloy_primitives::TxHash;
use batch::{find_batch_header_for_tx_index, StateBatchSource, StateRootBatch};
use eyre::eyre;
use message::{message_hash, MessageSource, SentMessage};
use proof::WitnessSource;
use tracing::{debug, info};

/// Everything needed to relay one message: the chain views and the L1 messenger.
pub struct Relayer<B, S, W, M> {
    batches: B,
    messages: S,
    witnesses: W,
    messenger: M,
    params: ProofParams,
    dry_run: bool,
}

impl<B, S, W, M> Relayer<B, S, W, M>
where
    B: StateBatchSource,
    S: MessageSource,
    W: WitnessSource,
    M: L1Messenger,
{
    pub const fn new(
        batches: B,
        messages: S,
        witnesses: W,
        messenger: M,
        params: ProofParams,
        dry_run: bool,
    ) -> Self {
        Self {
            batches,
            messages,
            witnesses,
            messenger,
            params,
            dry_run,
        }
    }

    pub const fn batches(&self) -> &B {
        &self.batches
    }

    pub const fn messages(&self) -> &S {
        &self.messages
    }

    pub const fn messenger(&self) -> &M {
        &self.messenger
    }

    pub const fn params(&self) -> ProofParams {
        self.params
    }

    /// Relay `sent` using the state roots of `batch`, which must cover it.
    ///
    /// Already relayed messages are skipped before any proof is built.
    pub async fn relay_message(
        &self,
        sent: &SentMessage,
        batch: &StateRootBatch,
    ) -> eyre::Result<RelayOutcome> {
        let hash = message_hash(&sent.message);
        if self.messenger.is_relayed(hash).await? {
            debug!(message_hash = %hash, "Message already relayed");
            return Ok(RelayOutcome::AlreadyRelayed);
        }

        let call_data = assemble_relay(&self.witnesses, sent, batch, self.params).await?;

        let relay = Relay {
            message: sent.message.clone(),
            call_data,
        };
        RelayAction::new(&self.messenger, relay, self.dry_run)
            .relay()
            .await
    }

    /// Relay the message emitted by one L2 transaction.
    ///
    /// Fails if another account is registered as the relayer, the transaction
    /// sent no message, its state root is not committed yet, or the committing
    /// batch can still be challenged.
    pub async fn relay_transaction(
        &self,
        tx_hash: TxHash,
    ) -> eyre::Result<(SentMessage, RelayOutcome)> {
        self.messenger.check_relayer().await?;

        let sent = self
            .messages
            .find_message_by_tx_hash(tx_hash)
            .await?
            .ok_or_else(|| eyre!("Transaction {tx_hash} sent no message"))?;

        let tx_index = sent.tx_index(self.params.block_offset).ok_or_else(|| {
            eyre!(
                "L2 block {} precedes the first committed state root",
                sent.block_number
            )
        })?;

        let header = find_batch_header_for_tx_index(&self.batches, tx_index)
            .await?
            .ok_or_else(|| eyre!("State root for transaction index {tx_index} not committed yet"))?;

        info!(
            tx_hash = %tx_hash,
            tx_index,
            batch_index = header.batch_index,
            "Found batch for message"
        );

        if self.batches.inside_challenge_window(&header).await? {
            eyre::bail!(
                "Batch {} is still inside the challenge window",
                header.batch_index
            );
        }

        let batch = self.batches.batch(&header).await?;
        let outcome = self.relay_message(&sent, &batch).await?;
        Ok((sent, outcome))
    }
}
