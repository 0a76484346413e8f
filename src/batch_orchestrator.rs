// batch_orchestrator.rs
//! Bounded-concurrency executor for multi-path reads/stats (spec §4.9, C9).
//!
//! Maintains at most `concurrency` in-flight tasks via a `tokio::sync::Semaphore`
//! permit per item — the same backpressure primitive spec §5 calls for
//! ("bounded concurrency provides natural backpressure"). Per-item failures
//! become error records in the result, not a pool-wide failure; a single
//! abort signal cancels everything in flight.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::cancellation::CancelToken;
use crate::error::FsContextError;

/// Result slot for one item, keeping its original index so callers can
/// reassemble output in input order even though completion order isn't
/// input order (spec §5).
pub struct BatchItem<T> {
    pub index: usize,
    pub result: Result<T, FsContextError>,
}

/// Runs `f` over every item in `items` with at most `concurrency` running
/// at once. `cancel` is checked before each task starts; once cancelled,
/// pending items are dropped and the whole call fails `E_CANCELLED` (spec
/// §4.9: "A single abort signal cancels all in-flight work").
pub async fn run<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    cancel: CancelToken,
    f: F,
) -> Result<Vec<BatchItem<T>>, FsContextError>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I, CancelToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FsContextError>> + Send,
{
    if cancel.check().is_err() {
        return Err(FsContextError::cancelled());
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let f = Arc::new(f);

    let tasks = items.into_iter().enumerate().map(|(index, item)| {
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let f = f.clone();
        async move {
            if cancel.check().is_err() {
                return BatchItem {
                    index,
                    result: Err(FsContextError::cancelled()),
                };
            }
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    return BatchItem {
                        index,
                        result: Err(FsContextError::cancelled()),
                    }
                }
            };
            if cancel.check().is_err() {
                return BatchItem {
                    index,
                    result: Err(FsContextError::cancelled()),
                };
            }
            let result = f(item, cancel.child()).await;
            BatchItem { index, result }
        }
    });

    let results = join_all(tasks).await;

    if cancel.check().is_err() && results.iter().all(|r| r.result.is_err()) {
        return Err(FsContextError::cancelled());
    }

    Ok(results)
}

/// Estimated bytes a read of `size` would consume under a `max_size` cap
/// (spec §4.9: `min(size, maxSize)` for partial reads).
pub fn estimated_read_bytes(size: u64, max_size: Option<u64>) -> u64 {
    match max_size {
        Some(cap) => size.min(cap),
        None => size,
    }
}

/// Runs the "total size budget" pass ahead of the real executor: entries
/// whose cumulative estimated bytes would exceed `max_total_size` are
/// flagged *skipped-by-budget* and never opened (spec §4.9 read-many
/// overlay). Returns `(proceed, skipped)` partitioning the input indices.
pub fn partition_by_budget(
    sizes: &[(usize, u64)],
    max_size: Option<u64>,
    max_total_size: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut proceed = Vec::with_capacity(sizes.len());
    let mut skipped = Vec::new();
    let mut running = 0u64;

    for &(idx, size) in sizes {
        let estimate = estimated_read_bytes(size, max_size);
        if running.saturating_add(estimate) > max_total_size {
            skipped.push(idx);
            continue;
        }
        running += estimate;
        proceed.push(idx);
    }

    (proceed, skipped)
}
