//! Worker pool behaviour against an in-memory, fault-injecting source.

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use vidrelay_core::control::AbortToken;
use vidrelay_core::downloader::{
    download_transfer, DownloadOptions, Transfer, TransferError, TransferState,
};
use vidrelay_core::progress::{ProgressAggregator, ProgressPhase};
use vidrelay_core::retry::{ErrorKind, RetryPolicy};
use vidrelay_core::segmenter::plan_segments;
use vidrelay_core::source::{ChunkStream, MediaSource, MemorySource, SourceError};

const MIB: u64 = 1024 * 1024;

fn options(workers: usize, attempts: u32) -> DownloadOptions {
    DownloadOptions {
        workers,
        retry: RetryPolicy::fixed(attempts, Duration::from_millis(1)),
    }
}

fn progress(total: u64) -> Arc<ProgressAggregator> {
    Arc::new(ProgressAggregator::new(
        ProgressPhase::Download,
        total,
        Duration::from_millis(400),
        None,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn thirty_five_mib_in_one_mib_segments_with_four_workers() {
    let body = common::payload((35 * MIB) as usize);
    let source = Arc::new(MemorySource::new(body.clone()));
    let dir = tempdir().unwrap();
    let dest = dir.path().join("clip.mp4.part");

    let mut transfer = Transfer::plan(35 * MIB, MIB).unwrap();
    assert_eq!(transfer.segments.len(), 35);
    let progress = progress(35 * MIB);
    let report = transfer
        .run(source.clone(), &dest, &options(4, 5), progress.clone(), &AbortToken::new())
        .await
        .unwrap();

    assert_eq!(report.segments, 35);
    assert_eq!(report.bytes, 35 * MIB);
    assert_eq!(report.retries, 0);
    assert_eq!(report.per_worker.len(), 4);
    assert_eq!(report.per_worker.iter().sum::<usize>(), 35);
    assert_eq!(progress.bytes_done(), 35 * MIB);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(source.calls().len(), 35);
}

#[tokio::test]
async fn uneven_tail_segment_is_reassembled() {
    let body = common::payload(10 * 1024 + 123);
    let source = Arc::new(MemorySource::with_piece_size(body.clone(), 333));
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.bin");
    let segments = plan_segments(body.len() as u64, 1024).unwrap();
    assert_eq!(segments.last().unwrap().length, 123);

    download_transfer(
        source,
        &segments,
        body.len() as u64,
        &dest,
        &options(3, 5),
        progress(body.len() as u64),
        &AbortToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn transient_failures_are_retried_without_double_counting() {
    let body = common::payload(8 * 4096);
    let source = Arc::new(MemorySource::with_piece_size(body.clone(), 1000));
    // Segment 3 fails mid-stream twice, after a partial write each time.
    source.fail_range(3 * 4096, ErrorKind::Transient, 2);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.bin");
    let (tx, mut rx) = tokio::sync::mpsc::channel(256);
    let progress = Arc::new(ProgressAggregator::new(
        ProgressPhase::Download,
        body.len() as u64,
        Duration::ZERO,
        Some(tx),
    ));

    let mut transfer = Transfer::plan(body.len() as u64, 4096).unwrap();
    let report = transfer
        .run(source.clone(), &dest, &options(2, 5), progress.clone(), &AbortToken::new())
        .await
        .unwrap();

    assert_eq!(report.retries, 2);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    let seg3_calls = source.calls().iter().filter(|(o, _)| *o == 3 * 4096).count();
    assert_eq!(seg3_calls, 3);

    // Every snapshot is monotonic and only the last one reaches the total.
    let mut seen = Vec::new();
    while let Ok(s) = rx.try_recv() {
        seen.push(s.bytes_done);
    }
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.iter().filter(|b| **b == body.len() as u64).count(), 1);
    assert_eq!(*seen.last().unwrap(), body.len() as u64);
}

#[tokio::test]
async fn exhausted_segment_fails_the_transfer() {
    let body = common::payload(6 * 1024);
    let source = Arc::new(MemorySource::new(body.clone()));
    source.fail_range(5 * 1024, ErrorKind::Transient, 100);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.bin");

    let mut transfer = Transfer::plan(body.len() as u64, 1024).unwrap();
    let err = transfer
        .run(source.clone(), &dest, &options(2, 3), progress(body.len() as u64), &AbortToken::new())
        .await
        .unwrap_err();

    match err {
        TransferError::SegmentExhausted { index, attempts, .. } => {
            assert_eq!(index, 5);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected SegmentExhausted, got {:?}", other),
    }
    let seg5_calls = source.calls().iter().filter(|(o, _)| *o == 5 * 1024).count();
    assert_eq!(seg5_calls, 3);
    assert_eq!(transfer.state, TransferState::Failed);
}

#[tokio::test]
async fn permanent_source_error_is_not_retried() {
    let body = common::payload(4 * 1024);
    let source = Arc::new(MemorySource::new(body.clone()));
    source.fail_range(1024, ErrorKind::Permanent, 1);
    let dir = tempdir().unwrap();

    let err = download_transfer(
        source.clone(),
        &plan_segments(4096, 1024).unwrap(),
        4096,
        &dir.path().join("out.bin"),
        &options(1, 5),
        progress(4096),
        &AbortToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TransferError::Source { index: 1, .. }), "{:?}", err);
    assert!(err.fatal_kind().is_none());
    assert_eq!(source.calls().iter().filter(|(o, _)| *o == 1024).count(), 1);
}

#[tokio::test]
async fn auth_failure_from_source_is_fatal() {
    let source = Arc::new(MemorySource::new(vec![7; 2048]));
    source.fail_range(0, ErrorKind::FatalAuth, 1);
    let dir = tempdir().unwrap();
    let err = download_transfer(
        source,
        &plan_segments(2048, 1024).unwrap(),
        2048,
        &dir.path().join("out.bin"),
        &options(1, 5),
        progress(2048),
        &AbortToken::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.fatal_kind(), Some(ErrorKind::FatalAuth));
}

#[tokio::test]
async fn abort_before_start_dispatches_nothing() {
    let source = Arc::new(MemorySource::new(vec![1; 4096]));
    let abort = AbortToken::new();
    abort.abort();
    let dir = tempdir().unwrap();
    let err = download_transfer(
        source.clone(),
        &plan_segments(4096, 1024).unwrap(),
        4096,
        &dir.path().join("out.bin"),
        &options(2, 5),
        progress(4096),
        &abort,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TransferError::Aborted { completed: 0, total: 4 }), "{:?}", err);
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn zero_sizes_are_rejected() {
    assert!(matches!(Transfer::plan(0, 1024), Err(TransferError::InvalidSize { .. })));
    assert!(matches!(Transfer::plan(1024, 0), Err(TransferError::InvalidSize { .. })));
    let source: Arc<dyn MediaSource> = Arc::new(MemorySource::new(Vec::new()));
    assert_eq!(source.size(), 0);
}

#[tokio::test]
async fn fatal_first_segment_stops_dispatch_of_queued_segments() {
    let source = Arc::new(MemorySource::new(common::payload(10 * 1024)));
    source.fail_range(0, ErrorKind::FatalQuota, 1);
    let dir = tempdir().unwrap();
    let err = download_transfer(
        source.clone(),
        &plan_segments(10 * 1024, 1024).unwrap(),
        10 * 1024,
        &dir.path().join("out.bin"),
        &options(1, 5),
        progress(10 * 1024),
        &AbortToken::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.fatal_kind(), Some(ErrorKind::FatalQuota));
    assert_eq!(source.calls(), vec![(0, 1024)]);
}

#[tokio::test]
async fn exhausted_segment_drops_requeued_siblings() {
    let source = Arc::new(MemorySource::new(common::payload(10 * 1024)));
    source.fail_range(0, ErrorKind::Transient, 100);
    source.fail_range(1024, ErrorKind::Transient, 100);
    let dir = tempdir().unwrap();
    let err = download_transfer(
        source.clone(),
        &plan_segments(10 * 1024, 1024).unwrap(),
        10 * 1024,
        &dir.path().join("out.bin"),
        &options(1, 2),
        progress(10 * 1024),
        &AbortToken::new(),
    )
    .await
    .unwrap_err();
    // Order: 0 fails, 1 fails, 2..=9 succeed, 0 fails again and exhausts.
    assert!(matches!(err, TransferError::SegmentExhausted { index: 0, attempts: 2, .. }), "{:?}", err);
    let calls = source.calls();
    assert_eq!(calls.len(), 11);
    // Segment 1 was waiting for its second attempt and is never dispatched again.
    assert_eq!(calls.iter().filter(|(o, _)| *o == 1024).count(), 1);
}

/// Sets the abort token while serving its `trigger`-th range.
struct AbortingSource {
    inner: MemorySource,
    abort: AbortToken,
    trigger: usize,
    served: AtomicUsize,
}

#[async_trait]
impl MediaSource for AbortingSource {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn fetch_range(&self, offset: u64, length: u64) -> Result<ChunkStream, SourceError> {
        if self.served.fetch_add(1, Ordering::SeqCst) + 1 == self.trigger {
            self.abort.abort();
        }
        self.inner.fetch_range(offset, length).await
    }
}

#[tokio::test]
async fn abort_mid_transfer_finishes_inflight_segment_and_dispatches_nothing_more() {
    let abort = AbortToken::new();
    let inner = MemorySource::new(common::payload(10 * 1024));
    let source = Arc::new(AbortingSource {
        inner: inner.clone(),
        abort: abort.clone(),
        trigger: 3,
        served: AtomicUsize::new(0),
    });
    let dir = tempdir().unwrap();
    let err = download_transfer(
        source,
        &plan_segments(10 * 1024, 1024).unwrap(),
        10 * 1024,
        &dir.path().join("out.bin"),
        &options(1, 5),
        progress(10 * 1024),
        &abort,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TransferError::Aborted { completed: 3, total: 10 }), "{:?}", err);
    assert_eq!(inner.calls().len(), 3);
}
