//! Batch orchestrator: download, upload and clean up one item at a time.
//!
//! Items run strictly in order. A fatal outcome (quota or auth) stops the
//! batch before the next item starts; every other failure is recorded and
//! the batch moves on. Local artifacts are removed on every exit path.

mod batch;
mod guard;
mod hooks;
mod item;
mod process;

pub use batch::BatchReport;
pub use guard::ArtifactGuard;
pub use hooks::{JsonLinesHook, PlaylistHook, PostUploadHook};
pub use item::{ItemResult, ItemSource, ItemState, WorkItem};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::control::AbortToken;
use crate::downloader::{DownloadOptions, DEFAULT_SEGMENT_SIZE};
use crate::ledger::Ledger;
use crate::progress::{ProgressStats, DEFAULT_REPORT_INTERVAL};
use crate::retry::RetryPolicy;
use crate::upload::{RemoteUploadService, ResumableUploader, DEFAULT_CHUNK_SIZE};

/// Tuning for every item of a batch.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory for `.part` files and finalized downloads.
    pub work_dir: PathBuf,
    pub segment_size: u64,
    pub download: DownloadOptions,
    pub chunk_size: u64,
    pub upload_retry: RetryPolicy,
    pub progress_interval: Duration,
}

impl PipelineOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            download: DownloadOptions::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_retry: RetryPolicy::default(),
            progress_interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

pub struct Orchestrator {
    uploader: ResumableUploader,
    options: PipelineOptions,
    hooks: Vec<Arc<dyn PostUploadHook>>,
    ledger: Option<Ledger>,
    progress_tx: Option<tokio::sync::mpsc::Sender<ProgressStats>>,
    abort: AbortToken,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn RemoteUploadService>, options: PipelineOptions) -> Self {
        let uploader = ResumableUploader::new(service, options.chunk_size, options.upload_retry);
        Self {
            uploader,
            options,
            hooks: Vec::new(),
            ledger: None,
            progress_tx: None,
            abort: AbortToken::new(),
        }
    }

    /// Record item states in `ledger` and skip sources it shows as uploaded.
    pub fn with_ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn PostUploadHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Send rate-limited download and upload snapshots to `tx`.
    pub fn with_progress(mut self, tx: tokio::sync::mpsc::Sender<ProgressStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Use an externally owned abort token (e.g. one set on Ctrl-C).
    pub fn with_abort(mut self, abort: AbortToken) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_token(&self) -> AbortToken {
        self.abort.clone()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }
}
