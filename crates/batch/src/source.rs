//! Sources of state root batches.

use crate::types::{BatchError, StateRootBatch, StateRootBatchHeader};
use alloy_consensus::Transaction;
use alloy_contract::private::Provider;
use alloy_primitives::{Address, TxHash};
use alloy_sol_types::SolCall;
use binding::ovm::IStateCommitmentChain::{self, appendStateBatchCall};
use std::{collections::BTreeMap, future::Future, sync::Arc};
use tokio::sync::Mutex;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, info, warn};

/// Default L1 blocks per `eth_getLogs` request.
pub const DEFAULT_LOGS_INTERVAL: u64 = 2_000;

/// Batch headers addressable by index.
///
/// This is all the batch locator needs, so it can be driven by an in-memory
/// list in tests.
pub trait IndexedEventSource: Send + Sync {
    /// Number of batches appended so far.
    fn total_batches(&self) -> impl Future<Output = Result<u64, BatchError>> + Send;

    /// Header of the batch at `batch_index`, or `None` if it does not exist yet.
    fn header_at(
        &self,
        batch_index: u64,
    ) -> impl Future<Output = Result<Option<StateRootBatchHeader>, BatchError>> + Send;
}

/// Everything the relay loop reads about batches.
pub trait StateBatchSource: IndexedEventSource {
    /// Recover the state roots committed by `header`.
    fn batch(
        &self,
        header: &StateRootBatchHeader,
    ) -> impl Future<Output = Result<StateRootBatch, BatchError>> + Send;

    /// Whether the batch can still be challenged.
    fn inside_challenge_window(
        &self,
        header: &StateRootBatchHeader,
    ) -> impl Future<Output = Result<bool, BatchError>> + Send;
}

/// A `StateBatchAppended` event reduced to what the relayer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AppendedBatch {
    header: StateRootBatchHeader,
    /// L1 transaction that appended the batch
    tx_hash: Option<TxHash>,
}

/// Batches seen so far and the next L1 block to scan.
#[derive(Debug)]
struct EventCache {
    batches: BTreeMap<u64, AppendedBatch>,
    next_block: u64,
}

impl EventCache {
    const fn new(start_block: u64) -> Self {
        Self {
            batches: BTreeMap::new(),
            next_block: start_block,
        }
    }

    fn get(&self, batch_index: u64) -> Option<&AppendedBatch> {
        self.batches.get(&batch_index)
    }

    /// Record the events of one scanned chunk ending at `to_block`.
    ///
    /// Nothing is recorded if any index appears twice.
    fn extend(&mut self, found: Vec<AppendedBatch>, to_block: u64) -> Result<(), BatchError> {
        for (i, batch) in found.iter().enumerate() {
            let batch_index = batch.header.batch_index;
            let count = 1
                + usize::from(self.batches.contains_key(&batch_index))
                + found[..i]
                    .iter()
                    .filter(|b| b.header.batch_index == batch_index)
                    .count();
            if count > 1 {
                return Err(BatchError::DuplicateEvent { batch_index, count });
            }
        }

        self.batches
            .extend(found.into_iter().map(|b| (b.header.batch_index, b)));
        self.next_block = to_block.saturating_add(1);
        Ok(())
    }
}

/// Scan forward in chunks of `interval` blocks until `batch_index` is cached
/// or `latest` has been scanned.
async fn scan_until<F, Fut>(
    cache: &mut EventCache,
    batch_index: u64,
    latest: u64,
    interval: u64,
    mut scan_chunk: F,
) -> Result<Option<AppendedBatch>, BatchError>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<Vec<AppendedBatch>, BatchError>>,
{
    while cache.get(batch_index).is_none() && cache.next_block <= latest {
        let from_block = cache.next_block;
        let to_block = from_block
            .saturating_add(interval.max(1) - 1)
            .min(latest);

        let found = scan_chunk(from_block, to_block).await?;
        debug!(
            from = from_block,
            to = to_block,
            batches = found.len(),
            "Scanned chunk for StateBatchAppended"
        );
        cache.extend(found, to_block)?;
    }

    Ok(cache.get(batch_index).cloned())
}

/// Batch source backed by the StateCommitmentChain contract on L1.
///
/// `StateBatchAppended` events are scanned once, in bounded chunks, and kept
/// in memory; clones share the cache.
#[derive(Clone)]
pub struct ChainBatchSource<P> {
    provider: P,
    state_commitment_chain: Address,
    logs_interval: u64,
    cache: Arc<Mutex<EventCache>>,
}

impl<P> ChainBatchSource<P>
where
    P: Provider + Clone,
{
    /// `start_block` bounds the event scan; no batch is expected before it.
    pub fn new(provider: P, state_commitment_chain: Address, start_block: u64) -> Self {
        Self {
            provider,
            state_commitment_chain,
            logs_interval: DEFAULT_LOGS_INTERVAL,
            cache: Arc::new(Mutex::new(EventCache::new(start_block))),
        }
    }

    /// Query at most `logs_interval` L1 blocks per `eth_getLogs` request.
    pub const fn with_logs_interval(mut self, logs_interval: u64) -> Self {
        self.logs_interval = logs_interval;
        self
    }

    /// Scan a single chunk with retry and exponential backoff.
    async fn scan_chunk_with_retry(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<AppendedBatch>, BatchError> {
        // 100ms, 200ms, 400ms, 800ms, 1.6s
        let retry_strategy = ExponentialBackoff::from_millis(100).take(5);

        Retry::spawn(retry_strategy, || async {
            self.scan_chunk(from_block, to_block).await.inspect_err(|e| {
                warn!(
                    from = from_block,
                    to = to_block,
                    error = %e,
                    "StateBatchAppended scan failed, will retry"
                );
            })
        })
        .await
    }

    async fn scan_chunk(&self, from_block: u64, to_block: u64) -> Result<Vec<AppendedBatch>, BatchError> {
        let contract = IStateCommitmentChain::new(self.state_commitment_chain, &self.provider);
        let events = contract
            .StateBatchAppended_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query()
            .await
            .map_err(|e| BatchError::Rpc(e.to_string()))?;

        events
            .iter()
            .map(|(event, log)| {
                Ok(AppendedBatch {
                    header: StateRootBatchHeader::try_from(event)?,
                    tx_hash: log.transaction_hash,
                })
            })
            .collect()
    }

    /// The appended batch at `batch_index`, scanning new L1 blocks if it is
    /// not cached yet.
    async fn appended_batch(&self, batch_index: u64) -> Result<Option<AppendedBatch>, BatchError> {
        let mut cache = self.cache.lock().await;
        if let Some(batch) = cache.get(batch_index) {
            return Ok(Some(batch.clone()));
        }

        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| BatchError::Rpc(e.to_string()))?;

        if cache.next_block <= latest {
            info!(
                batch_index,
                from = cache.next_block,
                to = latest,
                "Querying StateBatchAppended events"
            );
        }

        scan_until(
            &mut cache,
            batch_index,
            latest,
            self.logs_interval,
            move |from, to| self.scan_chunk_with_retry(from, to),
        )
        .await
    }
}

impl<P> IndexedEventSource for ChainBatchSource<P>
where
    P: Provider + Clone,
{
    async fn total_batches(&self) -> Result<u64, BatchError> {
        let contract = IStateCommitmentChain::new(self.state_commitment_chain, &self.provider);
        let total = contract
            .getTotalBatches()
            .call()
            .await
            .map_err(|e| BatchError::Rpc(e.to_string()))?;

        u64::try_from(total).map_err(|_| BatchError::ValueOutOfRange {
            field: "totalBatches",
            value: total,
        })
    }

    async fn header_at(&self, batch_index: u64) -> Result<Option<StateRootBatchHeader>, BatchError> {
        Ok(self
            .appended_batch(batch_index)
            .await?
            .map(|batch| batch.header))
    }
}

impl<P> StateBatchSource for ChainBatchSource<P>
where
    P: Provider + Clone,
{
    async fn batch(&self, header: &StateRootBatchHeader) -> Result<StateRootBatch, BatchError> {
        let batch_index = header.batch_index;
        let appended = self
            .appended_batch(batch_index)
            .await?
            .ok_or(BatchError::UnknownBatch(batch_index))?;

        let tx_hash = appended.tx_hash.ok_or(BatchError::TransactionNotFound {
            batch_index,
            tx_hash: None,
        })?;

        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(|e| BatchError::Rpc(e.to_string()))?
            .ok_or(BatchError::TransactionNotFound {
                batch_index,
                tx_hash: Some(tx_hash),
            })?;

        let call = appendStateBatchCall::abi_decode(tx.input()).map_err(|e| {
            BatchError::MalformedCalldata {
                batch_index,
                reason: e.to_string(),
            }
        })?;

        debug!(
            batch_index,
            tx_hash = %tx_hash,
            state_roots = call._batch.len(),
            "Recovered state roots from appendStateBatch calldata"
        );

        StateRootBatch::new(header.clone(), call._batch)
    }

    async fn inside_challenge_window(&self, header: &StateRootBatchHeader) -> Result<bool, BatchError> {
        let contract = IStateCommitmentChain::new(self.state_commitment_chain, &self.provider);
        contract
            .insideFraudProofWindow(header.to_abi())
            .call()
            .await
            .map_err(|e| BatchError::Rpc(e.to_string()))
    }
}
