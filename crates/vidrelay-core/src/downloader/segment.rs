//! Fetch one segment from the media source and write it at its own offset.

use futures_util::StreamExt;

use crate::progress::ProgressAggregator;
use crate::segmenter::Segment;
use crate::source::{MediaSource, SourceError};
use crate::storage::StorageWriter;

/// Why one attempt at a segment failed.
#[derive(Debug)]
pub(super) enum SegmentFailure {
    /// Fetch failed or delivered the wrong number of bytes. Classified for retry.
    Source(SourceError),
    /// Local write failed. Never retried.
    Storage(std::io::Error),
}

/// Outcome of one attempt: bytes of the segment that reached disk, plus the failure if any.
pub(super) struct Attempt {
    pub(super) written: u64,
    pub(super) result: Result<(), SegmentFailure>,
}

/// Streams `[segment.offset, segment.end())` into `storage`.
///
/// Each sub-chunk is written at the running offset and reported to `progress`
/// straight away. The pwrite runs on the worker task: pieces are at most one
/// network read (tens of KiB) and land in the page cache. `already_reported` is how much of this segment earlier
/// attempts counted; only bytes past it are reported again so a retried
/// segment never inflates the aggregate.
pub(super) async fn fetch_segment(
    source: &dyn MediaSource,
    segment: &Segment,
    storage: &StorageWriter,
    progress: &ProgressAggregator,
    already_reported: u64,
) -> Attempt {
    let mut written = 0u64;
    let result = stream_into(source, segment, storage, progress, already_reported, &mut written).await;
    Attempt { written, result }
}

async fn stream_into(
    source: &dyn MediaSource,
    segment: &Segment,
    storage: &StorageWriter,
    progress: &ProgressAggregator,
    already_reported: u64,
    written: &mut u64,
) -> Result<(), SegmentFailure> {
    let mut stream = source
        .fetch_range(segment.offset, segment.length)
        .await
        .map_err(SegmentFailure::Source)?;

    while let Some(item) = stream.next().await {
        let chunk = item.map_err(SegmentFailure::Source)?;
        if chunk.is_empty() {
            continue;
        }
        let room = segment.length - *written;
        if chunk.len() as u64 > room {
            // Keep what fits so the range is still ours alone, then retry.
            if room > 0 {
                storage
                    .write_at(segment.offset + *written, &chunk[..room as usize])
                    .map_err(SegmentFailure::Storage)?;
                report(progress, already_reported, *written, *written + room);
                *written += room;
            }
            return Err(SegmentFailure::Source(SourceError::transient(format!(
                "source overran range {}+{}",
                segment.offset, segment.length
            ))));
        }
        storage
            .write_at(segment.offset + *written, &chunk)
            .map_err(SegmentFailure::Storage)?;
        let len = chunk.len() as u64;
        report(progress, already_reported, *written, *written + len);
        *written += len;
    }

    if *written != segment.length {
        return Err(SegmentFailure::Source(SourceError::transient(format!(
            "partial range: expected {} bytes, got {}",
            segment.length, *written
        ))));
    }
    Ok(())
}

/// Report the part of `[from, to)` (segment-relative) not yet counted.
fn report(progress: &ProgressAggregator, already_reported: u64, from: u64, to: u64) {
    let start = from.max(already_reported);
    if to > start {
        progress.update(to - start);
    }
}
