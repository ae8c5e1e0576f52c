//! One item through the pipeline: resolve, plan, download, finalize, upload, clean up.

use std::path::Path;
use std::sync::Arc;

use super::guard::ArtifactGuard;
use super::item::{ItemResult, ItemState, WorkItem};
use super::Orchestrator;
use crate::downloader::{Transfer, TransferError};
use crate::ledger::LedgerState;
use crate::progress::{ProgressAggregator, ProgressPhase};
use crate::storage::{sanitize_filename, temp_path};
use crate::upload::UploadOutcome;

/// Item state for logging; illegal moves trip a debug assertion.
struct Lifecycle<'a> {
    source_ref: &'a str,
    state: ItemState,
}

impl<'a> Lifecycle<'a> {
    fn new(source_ref: &'a str) -> Self {
        Self {
            source_ref,
            state: ItemState::Pending,
        }
    }

    fn advance(&mut self, next: ItemState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal item transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(source = self.source_ref, from = ?self.state, to = ?next, "item state");
        self.state = next;
    }
}

impl Orchestrator {
    /// Run one item to a terminal result. Never panics on item failure and
    /// always removes the `.part` and final files before returning.
    pub async fn process_item(&self, item: &WorkItem) -> ItemResult {
        if let Some(ledger) = &self.ledger {
            match ledger.get(&item.source_ref).await {
                Ok(Some(entry)) if entry.state == LedgerState::Uploaded => {
                    tracing::info!(source = %item.source_ref, "already uploaded; skipping");
                    return ItemResult::AlreadyUploaded {
                        remote_id: entry.remote_id,
                    };
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(source = %item.source_ref, error = %e, "ledger lookup failed"),
            }
        }

        let filename = sanitize_filename(&item.declared_filename);
        let final_path = self.options.work_dir.join(&filename);
        let part_path = temp_path(&final_path);
        let mut guard = ArtifactGuard::new();
        guard.track(&part_path);
        guard.track(&final_path);

        let mut life = Lifecycle::new(&item.source_ref);
        let result = self
            .run_item(item, &mut life, &filename, &part_path, &final_path)
            .await;

        // Failures before the download starts leave the item `Pending`.
        debug_assert!(
            result.is_success() || matches!(life.state, ItemState::Pending | ItemState::Failed(_)),
            "item ended {:?} in state {:?}",
            result,
            life.state
        );
        let removed = guard.cleanup().await;
        if life.state == ItemState::Uploaded {
            life.advance(ItemState::Cleaned);
        }
        tracing::debug!(source = %item.source_ref, removed, "item artifacts cleaned");
        self.record_result(&item.source_ref, &result).await;
        result
    }

    async fn run_item(
        &self,
        item: &WorkItem,
        life: &mut Lifecycle<'_>,
        filename: &str,
        part_path: &Path,
        final_path: &Path,
    ) -> ItemResult {
        let source = match item.source.open().await {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(source = %item.source_ref, error = %e, "could not open source");
                let reason = format!("open source: {}", e);
                return if e.kind.is_fatal() {
                    ItemResult::Fatal { reason }
                } else {
                    ItemResult::Failed { reason }
                };
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.options.work_dir).await {
            return ItemResult::Failed {
                reason: format!("create {}: {}", self.options.work_dir.display(), e),
            };
        }

        let total_size = source.size();
        let mut transfer = match Transfer::plan(total_size, self.options.segment_size) {
            Ok(t) => t,
            Err(e) => return ItemResult::Failed { reason: e.to_string() },
        };

        life.advance(ItemState::Downloading);
        self.record_state(&item.source_ref, Some(filename), LedgerState::Downloading).await;
        tracing::info!(
            source = %item.source_ref,
            file = filename,
            bytes = total_size,
            segments = transfer.segments.len(),
            "downloading"
        );
        let progress = Arc::new(ProgressAggregator::new(
            ProgressPhase::Download,
            total_size,
            self.options.progress_interval,
            self.progress_tx.clone(),
        ));
        let report = transfer
            .run(
                Arc::clone(&source),
                part_path,
                &self.options.download,
                progress,
                &self.abort,
            )
            .await;
        let report = match report {
            Ok(r) => r,
            Err(e) => {
                let result = download_failure(&e);
                life.advance(ItemState::Failed(e.to_string()));
                tracing::warn!(source = %item.source_ref, error = %e, "download failed");
                return result;
            }
        };
        tracing::debug!(
            source = %item.source_ref,
            retries = report.retries,
            per_worker = ?report.per_worker,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "download finished"
        );

        if let Err(e) = tokio::fs::rename(part_path, final_path).await {
            let reason = format!("finalize {}: {}", final_path.display(), e);
            tracing::warn!(source = %item.source_ref, reason = %reason, "could not finalize download");
            life.advance(ItemState::Failed(reason.clone()));
            return ItemResult::Failed { reason };
        }
        life.advance(ItemState::Downloaded);

        life.advance(ItemState::Uploading);
        self.record_state(&item.source_ref, None, LedgerState::Uploading).await;
        tracing::info!(source = %item.source_ref, title = %item.metadata.title, "uploading");
        let progress = ProgressAggregator::new(
            ProgressPhase::Upload,
            total_size,
            self.options.progress_interval,
            self.progress_tx.clone(),
        );
        match self.uploader.upload(final_path, &item.metadata, &progress).await {
            UploadOutcome::Uploaded { remote_id } => {
                life.advance(ItemState::Uploaded);
                tracing::info!(source = %item.source_ref, remote_id = %remote_id, "uploaded");
                self.run_hooks(item, &remote_id).await;
                ItemResult::Success { remote_id }
            }
            UploadOutcome::Failed(reason) => {
                tracing::warn!(source = %item.source_ref, reason = %reason, "upload failed");
                life.advance(ItemState::Failed(reason.clone()));
                ItemResult::Failed { reason }
            }
            UploadOutcome::Fatal(reason) => {
                tracing::error!(source = %item.source_ref, reason = %reason, "upload rejected fatally");
                life.advance(ItemState::Failed(reason.clone()));
                ItemResult::Fatal { reason }
            }
        }
    }

    async fn run_hooks(&self, item: &WorkItem, remote_id: &str) {
        for hook in &self.hooks {
            if let Err(e) = hook.after_upload(item, remote_id).await {
                tracing::warn!(hook = hook.name(), remote_id, error = %format!("{:#}", e), "post-upload hook failed");
            }
        }
    }

    async fn record_state(&self, source_ref: &str, filename: Option<&str>, state: LedgerState) {
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.record_state(source_ref, filename, state).await {
                tracing::warn!(source = source_ref, error = %e, "ledger write failed");
            }
        }
    }

    async fn record_result(&self, source_ref: &str, result: &ItemResult) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        let written = match result {
            ItemResult::AlreadyUploaded { .. } => return,
            ItemResult::Success { remote_id } => {
                ledger
                    .record_result(source_ref, LedgerState::Uploaded, Some(remote_id), None)
                    .await
            }
            ItemResult::Failed { reason } => {
                ledger
                    .record_result(source_ref, LedgerState::Failed, None, Some(reason))
                    .await
            }
            ItemResult::Fatal { reason } => {
                ledger
                    .record_result(source_ref, LedgerState::Fatal, None, Some(reason))
                    .await
            }
        };
        if let Err(e) = written {
            tracing::warn!(source = source_ref, error = %e, "ledger write failed");
        }
    }
}

/// Fatal source classifications halt the batch like an upload fatal.
fn download_failure(e: &TransferError) -> ItemResult {
    if e.fatal_kind().is_some() {
        ItemResult::Fatal { reason: e.to_string() }
    } else {
        ItemResult::Failed { reason: e.to_string() }
    }
}
