//! Locate the batch that committed the state root of an L2 transaction.

use crate::{
    source::IndexedEventSource,
    types::{BatchError, StateRootBatchHeader},
};
use tracing::debug;

/// Where a transaction index falls relative to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// The index precedes the batch
    Before,
    /// The batch commits the index
    Within,
    /// The index follows the batch
    After,
}

fn position(header: &StateRootBatchHeader, tx_index: u64) -> Position {
    if tx_index < header.prev_total_elements {
        Position::Before
    } else if tx_index >= header.end() {
        Position::After
    } else {
        Position::Within
    }
}

async fn fetch_header<S>(
    source: &S,
    batch_index: u64,
    total: u64,
) -> Result<StateRootBatchHeader, BatchError>
where
    S: IndexedEventSource,
{
    source
        .header_at(batch_index)
        .await?
        .ok_or(BatchError::MissingHeader { batch_index, total })
}

/// Find the header of the batch whose range contains `tx_index`.
///
/// Returns `None` when no batch has been appended yet or when the index is
/// past everything committed so far. The newest batch is checked first, then
/// the rest is binary searched: at most `log2(total) + 2` headers are fetched.
pub async fn find_batch_header_for_tx_index<S>(
    source: &S,
    tx_index: u64,
) -> Result<Option<StateRootBatchHeader>, BatchError>
where
    S: IndexedEventSource,
{
    let total = source.total_batches().await?;
    if total == 0 {
        return Ok(None);
    }

    let last = fetch_header(source, total - 1, total).await?;
    match position(&last, tx_index) {
        Position::Within => return Ok(Some(last)),
        Position::After => {
            debug!(
                tx_index,
                committed = last.end(),
                "Transaction index not committed yet"
            );
            return Ok(None);
        }
        Position::Before => {}
    }

    // The last batch is excluded: search [lo, hi).
    let mut lo = 0;
    let mut hi = total - 1;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let header = fetch_header(source, mid, total).await?;

        match position(&header, tx_index) {
            Position::Within => return Ok(Some(header)),
            Position::Before => hi = mid,
            Position::After => lo = mid + 1,
        }
    }

    Ok(None)
}
