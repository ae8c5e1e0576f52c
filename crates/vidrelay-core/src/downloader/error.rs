//! Transfer-level errors surfaced to the orchestrator.

use crate::retry::ErrorKind;
use crate::source::SourceError;

/// Why a transfer (one object download) did not produce a complete file.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Declared object size or segment size is zero. Not retried.
    #[error("invalid transfer size: total {total_size} bytes, segment size {segment_size} bytes")]
    InvalidSize { total_size: u64, segment_size: u64 },

    /// A segment used up its retry budget; the file is incomplete.
    #[error("segment {index} failed after {attempts} attempts: {last_error}")]
    SegmentExhausted {
        index: usize,
        attempts: u32,
        last_error: String,
    },

    /// The source rejected a segment with a non-retryable classification.
    #[error("segment {index}: {source}")]
    Source {
        index: usize,
        #[source]
        source: SourceError,
    },

    /// Disk write or preallocation failed. Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),

    /// Abort was requested before every segment completed.
    #[error("transfer aborted after {completed} of {total} segments")]
    Aborted { completed: usize, total: usize },
}

impl TransferError {
    /// Source-level fatal classification (auth or quota), which halts the batch.
    pub fn fatal_kind(&self) -> Option<ErrorKind> {
        match self {
            TransferError::Source { source, .. } if source.kind.is_fatal() => Some(source.kind),
            _ => None,
        }
    }
}
