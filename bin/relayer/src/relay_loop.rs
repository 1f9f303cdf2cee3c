//! Cursor-driven relay loop over finalized state root batches.
//!
//! The loop owns a single cursor, the index of the next batch whose messages
//! have not all been attempted. Each tick looks at the batch under the cursor
//! and either waits (no batch yet, or still challengeable), defers (proofs not
//! available yet) or relays every message in the batch and advances.

use crate::{metrics::Metrics, relayer::Relayer};
use action::relay::{L1Messenger, RelayOutcome};
use batch::{StateBatchSource, StateRootBatchHeader};
use message::{message_hash, MessageSource};
use proof::{ProofError, WitnessSource};
use std::{
    future::Future,
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-batch tally of message outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_index: u64,
    pub relayed: usize,
    pub already_relayed: usize,
    /// Dry-run relays that simulated successfully
    pub simulated: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn new(batch_index: u64) -> Self {
        Self {
            batch_index,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: &RelayOutcome) {
        match outcome {
            RelayOutcome::Relayed(_) => self.relayed += 1,
            RelayOutcome::AlreadyRelayed => self.already_relayed += 1,
            RelayOutcome::DryRun => self.simulated += 1,
        }
    }
}

/// What one tick of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// No batch at the cursor yet
    WaitForBatch { batch_index: u64 },
    /// The batch at the cursor is still inside its challenge window
    WaitForFinality { batch_index: u64 },
    /// The batch at the cursor is final and its messages are due
    ProcessMessages(StateRootBatchHeader),
    /// Every message of the batch was attempted; the cursor moved past it
    Advance(BatchReport),
    /// The batch must be retried later; the cursor did not move
    Defer { batch_index: u64, reason: String },
}

impl Step {
    /// Whether the loop should sleep before the next tick.
    pub const fn is_waiting(&self) -> bool {
        !matches!(self, Self::Advance(_) | Self::ProcessMessages(_))
    }

    fn shutdown(batch_index: u64) -> Self {
        Self::Defer {
            batch_index,
            reason: "shutdown requested".to_string(),
        }
    }
}

pub struct RelayLoop<B, S, W, M> {
    relayer: Relayer<B, S, W, M>,
    polling_interval: Duration,
    cursor: u64,
    metrics: Metrics,
    cancel: CancellationToken,
}

impl<B, S, W, M> RelayLoop<B, S, W, M>
where
    B: StateBatchSource,
    S: MessageSource,
    W: WitnessSource,
    M: L1Messenger,
{
    pub fn new(
        relayer: Relayer<B, S, W, M>,
        polling_interval: Duration,
        start_batch_index: u64,
        metrics: Metrics,
    ) -> Self {
        metrics.set_cursor(start_batch_index);
        Self {
            relayer,
            polling_interval,
            cursor: start_batch_index,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    /// Index of the next batch to process.
    pub const fn cursor(&self) -> u64 {
        self.cursor
    }

    pub const fn relayer(&self) -> &Relayer<B, S, W, M> {
        &self.relayer
    }

    /// Token that stops [`RelayLoop::run`] when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Await a chain read unless shutdown is requested first.
    async fn unless_cancelled<T, E>(
        &self,
        read: impl Future<Output = Result<T, E>>,
    ) -> eyre::Result<Option<T>>
    where
        E: Into<eyre::Report>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Ok(None),
            result = read => result.map(Some).map_err(Into::into),
        }
    }

    /// Decide what the batch under the cursor needs.
    async fn next_step(&self) -> eyre::Result<Step> {
        let batch_index = self.cursor;
        let batches = self.relayer.batches();

        self.relayer.messenger().check_relayer().await?;

        let Some(header) = batches.header_at(batch_index).await? else {
            return Ok(Step::WaitForBatch { batch_index });
        };

        if batches.inside_challenge_window(&header).await? {
            return Ok(Step::WaitForFinality { batch_index });
        }

        Ok(Step::ProcessMessages(header))
    }

    /// Run one step of the loop.
    ///
    /// Returns the step taken. The cursor moves by exactly one on
    /// [`Step::Advance`] and never otherwise.
    pub async fn tick(&mut self) -> eyre::Result<Step> {
        let step = match self.unless_cancelled(self.next_step()).await? {
            Some(Step::ProcessMessages(header)) => self.process_batch(header).await?,
            Some(step) => step,
            None => Step::shutdown(self.cursor),
        };

        match &step {
            Step::Advance(report) => {
                self.cursor += 1;
                self.metrics.set_cursor(self.cursor);
                self.metrics.record_batch(report);
                info!(
                    batch_index = report.batch_index,
                    relayed = report.relayed,
                    already_relayed = report.already_relayed,
                    simulated = report.simulated,
                    failed = report.failed,
                    cursor = self.cursor,
                    "Batch processed"
                );
            }
            Step::Defer {
                batch_index,
                reason,
            } => {
                self.metrics.record_deferred();
                warn!(batch_index = *batch_index, reason = %reason, "Batch deferred");
            }
            Step::WaitForBatch { batch_index } => {
                debug!(batch_index = *batch_index, "Waiting for batch");
            }
            Step::WaitForFinality { batch_index } => {
                debug!(
                    batch_index = *batch_index,
                    "Waiting for batch to leave the challenge window"
                );
            }
            Step::ProcessMessages(_) => {}
        }

        Ok(step)
    }

    /// Attempt every message of a final batch, in event order.
    async fn process_batch(&self, header: StateRootBatchHeader) -> eyre::Result<Step> {
        let batch_index = header.batch_index;
        let mut report = BatchReport::new(batch_index);

        let Some((from_block, to_block)) = header.l2_block_range(self.relayer.params().block_offset)
        else {
            return Ok(Step::Advance(report));
        };

        let Some(batch) = self
            .unless_cancelled(self.relayer.batches().batch(&header))
            .await?
        else {
            return Ok(Step::shutdown(batch_index));
        };
        let Some(messages) = self
            .unless_cancelled(self.relayer.messages().sent_messages(from_block, to_block))
            .await?
        else {
            return Ok(Step::shutdown(batch_index));
        };

        info!(
            batch_index,
            from_block,
            to_block,
            messages = messages.len(),
            "Processing finalized batch"
        );

        for sent in &messages {
            // Relays in flight are never interrupted
            if self.cancel.is_cancelled() {
                return Ok(Step::shutdown(batch_index));
            }

            let hash = message_hash(&sent.message);
            match self.relayer.relay_message(sent, &batch).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    if let Some(err @ ProofError::ProofUnavailable { .. }) =
                        e.downcast_ref::<ProofError>()
                    {
                        return Ok(Step::Defer {
                            batch_index,
                            reason: err.to_string(),
                        });
                    }

                    // The relay may have landed despite the error.
                    match self.relayer.messenger().is_relayed(hash).await {
                        Ok(true) => {
                            info!(message_hash = %hash, "Message relayed despite error");
                            report.relayed += 1;
                        }
                        Ok(false) | Err(_) => {
                            error!(
                                batch_index,
                                message_hash = %hash,
                                tx_hash = %sent.tx_hash,
                                error = %e,
                                "Failed to relay message, skipping"
                            );
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        Ok(Step::Advance(report))
    }

    /// Run until the cancel token fires.
    ///
    /// Waiting steps and failed ticks sleep for the polling interval; an
    /// advance continues with the next batch immediately.
    pub async fn run(&mut self) -> eyre::Result<()> {
        info!(
            cursor = self.cursor,
            polling_interval = ?self.polling_interval,
            "Starting relay loop"
        );

        while !self.cancel.is_cancelled() {
            let started = Instant::now();
            let wait = match self.tick().await {
                Ok(step) => step.is_waiting(),
                Err(e) => {
                    self.metrics.record_loop_error();
                    error!(cursor = self.cursor, error = %e, "Relay loop tick failed");
                    true
                }
            };
            self.metrics.record_tick(started.elapsed());

            if wait {
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    () = sleep(self.polling_interval) => {}
                }
            }
        }

        info!(cursor = self.cursor, "Relay loop stopped");
        Ok(())
    }
}
