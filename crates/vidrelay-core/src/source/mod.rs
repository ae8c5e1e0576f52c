//! Media sources: where segment bytes come from.
//!
//! The worker pool only sees the `MediaSource` trait: a known total size and
//! a lazy stream of byte chunks for any half-open range. Chunks of one range
//! arrive in ascending position and may be smaller than requested.

mod http;
mod memory;
mod probe;

pub use http::{HttpMediaSource, HttpSourceResolver};
pub use memory::MemorySource;
pub use probe::{probe, HeadResult};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;

use crate::retry::{Classify, ErrorKind};

/// Lazy sequence of byte chunks for one requested range.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, SourceError>>;

/// A remote object of known size that can be read by byte range.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Total size of the object in bytes.
    fn size(&self) -> u64;

    /// Start fetching `[offset, offset + length)`.
    async fn fetch_range(&self, offset: u64, length: u64) -> Result<ChunkStream, SourceError>;
}

/// Opens a media source when its batch item comes up rather than when the
/// batch is built.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self) -> Result<Arc<dyn MediaSource>, SourceError>;
}

/// Error from a media source, classified for the retry policy.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} ({})", .kind.as_str())]
pub struct SourceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }
}

impl Classify for SourceError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}
