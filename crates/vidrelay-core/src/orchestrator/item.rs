use std::sync::Arc;

use crate::source::{MediaSource, SourceError, SourceResolver};
use crate::upload::VideoMetadata;

/// Where an item's bytes come from.
#[derive(Clone)]
pub enum ItemSource {
    /// Already open, size known.
    Ready(Arc<dyn MediaSource>),
    /// Opened by the orchestrator when the item's turn comes.
    Deferred(Arc<dyn SourceResolver>),
}

impl ItemSource {
    pub fn deferred(resolver: impl SourceResolver + 'static) -> Self {
        ItemSource::Deferred(Arc::new(resolver))
    }

    pub(super) async fn open(&self) -> Result<Arc<dyn MediaSource>, SourceError> {
        match self {
            ItemSource::Ready(source) => Ok(Arc::clone(source)),
            ItemSource::Deferred(resolver) => resolver.resolve().await,
        }
    }
}

impl<S: MediaSource + 'static> From<Arc<S>> for ItemSource {
    fn from(source: Arc<S>) -> Self {
        ItemSource::Ready(source)
    }
}

/// One unit of the batch: a remote object plus what to publish it as.
#[derive(Clone)]
pub struct WorkItem {
    /// Stable reference to the original (URL, message link). Ledger key.
    pub source_ref: String,
    /// Filename the object should be stored under locally.
    pub declared_filename: String,
    /// Collection (playlist) the upload is filed under.
    pub category: Option<String>,
    pub metadata: VideoMetadata,
    pub source: ItemSource,
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            ItemSource::Ready(s) => format!("ready ({} bytes)", s.size()),
            ItemSource::Deferred(_) => "deferred".to_string(),
        };
        f.debug_struct("WorkItem")
            .field("source_ref", &self.source_ref)
            .field("declared_filename", &self.declared_filename)
            .field("category", &self.category)
            .field("source", &source)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of an item inside `process_item`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Downloading,
    Downloaded,
    Uploading,
    Uploaded,
    Cleaned,
    Failed(String),
}

impl ItemState {
    /// Legal forward moves. `Failed` is absorbing and reachable only while a
    /// transfer is running; `Cleaned` follows any finished item.
    pub fn can_advance_to(&self, next: &ItemState) -> bool {
        use ItemState::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Downloaded)
                | (Downloading, Failed(_))
                | (Downloaded, Uploading)
                | (Uploading, Uploaded)
                | (Uploading, Failed(_))
                | (Uploaded, Cleaned)
                | (Downloaded, Cleaned)
        )
    }
}

/// Terminal outcome for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    Success { remote_id: String },
    /// The ledger shows this source was uploaded by an earlier run.
    AlreadyUploaded { remote_id: Option<String> },
    Failed { reason: String },
    /// Quota or auth failure; no further items may start.
    Fatal { reason: String },
}

impl ItemResult {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ItemResult::Fatal { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemResult::Success { .. } | ItemResult::AlreadyUploaded { .. })
    }
}
