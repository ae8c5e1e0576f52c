//! Core segmented downloader engine.
//!
//! Pre-allocates the destination file, then runs a fixed pool of `workers`
//! tasks that pull segment indices from a shared queue, stream each range
//! from the `MediaSource` and write it at the segment's own offset. Failed
//! segments are requeued after a fixed delay until their attempt budget is
//! spent; one exhausted segment fails the whole transfer.

mod error;
mod pool;
mod queue;
mod segment;

pub use error::TransferError;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::control::AbortToken;
use crate::progress::ProgressAggregator;
use crate::retry::RetryPolicy;
use crate::segmenter::{plan_segments, Segment};
use crate::source::MediaSource;
use crate::storage::StorageWriter;

/// Default number of concurrent segment workers.
pub const DEFAULT_WORKERS: usize = 16;
/// Default segment size (1 MiB).
pub const DEFAULT_SEGMENT_SIZE: u64 = 1024 * 1024;

/// Worker pool tuning for one transfer.
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    /// Upper bound on segments in flight at once.
    pub workers: usize,
    /// Attempts per segment and the delay before a requeue.
    pub retry: RetryPolicy,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            retry: RetryPolicy::fixed(5, Duration::from_millis(500)),
        }
    }
}

/// Where a transfer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    Downloading,
    Downloaded,
    Failed,
}

/// One object download: planned segments plus state. Owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub total_size: u64,
    pub segment_size: u64,
    pub segments: Vec<Segment>,
    pub state: TransferState,
}

impl Transfer {
    /// Plan a transfer. Fails with `InvalidSize` for a zero total or segment size.
    pub fn plan(total_size: u64, segment_size: u64) -> Result<Self, TransferError> {
        let segments = plan_segments(total_size, segment_size)?;
        Ok(Self {
            total_size,
            segment_size,
            segments,
            state: TransferState::Pending,
        })
    }

    /// Run the worker pool for this transfer, updating `state` on the way.
    pub async fn run(
        &mut self,
        source: Arc<dyn MediaSource>,
        dest: &Path,
        options: &DownloadOptions,
        progress: Arc<ProgressAggregator>,
        abort: &AbortToken,
    ) -> Result<TransferReport, TransferError> {
        self.state = TransferState::Downloading;
        let result = download_transfer(source, &self.segments, self.total_size, dest, options, progress, abort).await;
        self.state = match result {
            Ok(_) => TransferState::Downloaded,
            Err(_) => TransferState::Failed,
        };
        result
    }
}

/// Summary of a finished transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub segments: usize,
    pub bytes: u64,
    /// Failed attempts that were retried.
    pub retries: u32,
    /// Segments completed by each worker, in worker order.
    pub per_worker: Vec<usize>,
    pub elapsed: Duration,
}

/// Downloads every segment of `segments` into `dest`, which is created and
/// pre-allocated to exactly `total_size` bytes first.
///
/// Returns an error unless every segment reached `Done`; in that case the
/// contents of `dest` must not be used.
pub async fn download_transfer(
    source: Arc<dyn MediaSource>,
    segments: &[Segment],
    total_size: u64,
    dest: &Path,
    options: &DownloadOptions,
    progress: Arc<ProgressAggregator>,
    abort: &AbortToken,
) -> Result<TransferReport, TransferError> {
    if total_size == 0 || segments.is_empty() {
        return Err(TransferError::InvalidSize {
            total_size,
            segment_size: segments.first().map(|s| s.length).unwrap_or(0),
        });
    }
    let started = Instant::now();

    let storage = StorageWriter::create_preallocated(dest, total_size).map_err(into_io)?;

    let workers = options.workers.max(1).min(segments.len());
    tracing::debug!(
        path = %dest.display(),
        total_size,
        segments = segments.len(),
        workers,
        "starting segmented download"
    );

    let outcome = pool::run_pool(
        source,
        segments.to_vec(),
        &storage,
        workers,
        options.retry,
        progress,
        abort.clone(),
    )
    .await?;

    storage.sync().map_err(into_io)?;

    let report = TransferReport {
        segments: segments.len(),
        bytes: total_size,
        retries: outcome.retries,
        per_worker: outcome.per_worker,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        path = %dest.display(),
        bytes = report.bytes,
        retries = report.retries,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "download complete"
    );
    Ok(report)
}

fn into_io(e: anyhow::Error) -> TransferError {
    let kind = e
        .downcast_ref::<std::io::Error>()
        .map(|io| io.kind())
        .unwrap_or(std::io::ErrorKind::Other);
    TransferError::Storage(std::io::Error::new(kind, format!("{:#}", e)))
}
