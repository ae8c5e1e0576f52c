//! Bounded worker pool over the shared segment queue.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;

use super::queue::WorkQueue;
use super::segment::{fetch_segment, SegmentFailure};
use super::TransferError;
use crate::control::AbortToken;
use crate::progress::ProgressAggregator;
use crate::retry::{Classify, ErrorKind, RetryDecision, RetryPolicy};
use crate::segmenter::{Segment, SegmentTable};
use crate::source::MediaSource;
use crate::storage::StorageWriter;

pub(super) struct PoolOutcome {
    pub(super) retries: u32,
    pub(super) per_worker: Vec<usize>,
}

struct Shared {
    source: Arc<dyn MediaSource>,
    segments: Vec<Segment>,
    queue: WorkQueue,
    table: Mutex<SegmentTable>,
    retry: RetryPolicy,
    progress: Arc<ProgressAggregator>,
    abort: AbortToken,
}

impl Shared {
    fn table(&self) -> std::sync::MutexGuard<'_, SegmentTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs `workers` tasks until the queue drains or a segment fails terminally.
/// Every worker gets its own file handle; writes never share a lock.
pub(super) async fn run_pool(
    source: Arc<dyn MediaSource>,
    segments: Vec<Segment>,
    storage: &StorageWriter,
    workers: usize,
    retry: RetryPolicy,
    progress: Arc<ProgressAggregator>,
    abort: AbortToken,
) -> Result<PoolOutcome, TransferError> {
    let count = segments.len();
    let shared = Arc::new(Shared {
        source,
        queue: WorkQueue::new(segments.iter().map(|s| s.index)),
        segments,
        table: Mutex::new(SegmentTable::new(count)),
        retry,
        progress,
        abort,
    });

    let mut set = JoinSet::new();
    for worker in 0..workers {
        let handle = storage.worker_handle().map_err(super::into_io)?;
        let shared = Arc::clone(&shared);
        set.spawn(async move { (worker, run_worker(worker, &shared, handle).await) });
    }

    let mut per_worker = vec![0usize; workers];
    let mut first_error: Option<TransferError> = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((worker, Ok(done))) => per_worker[worker] = done,
            Ok((_, Err(e))) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(join_err) => {
                shared.queue.close();
                if first_error.is_none() {
                    first_error = Some(TransferError::Storage(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("segment worker panicked: {}", join_err),
                    )));
                }
            }
        }
    }

    let table = shared.table();
    if let Some(e) = first_error {
        tracing::debug!(
            failed = ?table.failed(),
            completed = table.done_count(),
            total = table.len(),
            "transfer stopped"
        );
        return Err(e);
    }
    if !table.all_done() {
        // Only an external abort closes the queue without a worker error.
        return Err(TransferError::Aborted {
            completed: table.done_count(),
            total: table.len(),
        });
    }
    Ok(PoolOutcome {
        retries: table.total_retries(),
        per_worker,
    })
}

/// One worker: pull, fetch, write, report, requeue on transient failure.
/// Returns the number of segments this worker completed.
async fn run_worker(worker: usize, shared: &Shared, storage: StorageWriter) -> Result<usize, TransferError> {
    let mut completed = 0usize;
    while let Some(index) = shared.queue.pull().await {
        if shared.abort.is_aborted() {
            tracing::debug!(worker, "abort requested; no further segments dispatched");
            shared.queue.close();
            shared.queue.complete();
            break;
        }
        let segment = shared.segments[index];
        let already_reported = {
            let mut table = shared.table();
            table.mark_inflight(index);
            table.reported(index)
        };

        let attempt = fetch_segment(
            shared.source.as_ref(),
            &segment,
            &storage,
            &shared.progress,
            already_reported,
        )
        .await;
        shared.table().set_reported(index, attempt.written);

        match attempt.result {
            Ok(()) => {
                shared.table().mark_done(index);
                shared.queue.complete();
                completed += 1;
            }
            Err(SegmentFailure::Storage(e)) => {
                tracing::warn!(worker, index, error = %e, "segment write failed");
                shared.table().mark_failed(index);
                shared.queue.close();
                shared.queue.complete();
                return Err(TransferError::Storage(e));
            }
            Err(SegmentFailure::Source(e)) => {
                let attempts = shared.table().record_failure(index);
                match shared.retry.decide(attempts, e.kind()) {
                    RetryDecision::RetryAfter(delay) => {
                        tracing::debug!(
                            worker,
                            index,
                            attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "segment failed; requeueing"
                        );
                        tokio::time::sleep(delay).await;
                        shared.table().mark_pending(index);
                        shared.queue.requeue(index);
                    }
                    RetryDecision::NoRetry => {
                        tracing::warn!(worker, index, attempts, error = %e, "segment failed terminally");
                        shared.table().mark_failed(index);
                        shared.queue.close();
                        shared.queue.complete();
                        if e.kind() != ErrorKind::Transient {
                            return Err(TransferError::Source { index, source: e });
                        }
                        return Err(TransferError::SegmentExhausted {
                            index,
                            attempts,
                            last_error: e.to_string(),
                        });
                    }
                }
            }
        }
        // Cooperative hand-off so sibling workers get a turn at the queue.
        tokio::task::yield_now().await;
    }
    Ok(completed)
}
