//! Sequential chunk loop with status-confirmed resume.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::session::UploadSession;
use super::{ChunkResponse, RemoteUploadService, UploadError, VideoMetadata};
use crate::progress::ProgressAggregator;
use crate::retry::{run_with_retry, Classify, ErrorKind, RetryDecision, RetryPolicy};

/// Default chunk size (8 MiB). Services usually require a multiple of 256 KiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Terminal result of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { remote_id: String },
    /// This item failed; the batch may continue.
    Failed(String),
    /// Quota or authorization failure; the batch must stop.
    Fatal(String),
}

impl UploadOutcome {
    fn from_error(e: &UploadError) -> Self {
        if e.kind().is_fatal() {
            UploadOutcome::Fatal(e.to_string())
        } else {
            UploadOutcome::Failed(e.to_string())
        }
    }
}

/// Drives one file through a resumable session, one chunk in flight.
pub struct ResumableUploader {
    service: Arc<dyn RemoteUploadService>,
    chunk_size: u64,
    retry: RetryPolicy,
}

impl ResumableUploader {
    /// `chunk_size` of 0 is bumped to 1 byte; callers validate config upstream.
    pub fn new(service: Arc<dyn RemoteUploadService>, chunk_size: u64, retry: RetryPolicy) -> Self {
        Self {
            service,
            chunk_size: chunk_size.max(1),
            retry,
        }
    }

    /// Upload `path` with `metadata`, reporting acknowledged bytes to `progress`.
    ///
    /// After a transient chunk failure the loop backs off, asks the service
    /// how much it holds and continues from there. The session is never
    /// re-opened and acknowledged bytes are never sent again.
    pub async fn upload(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        progress: &ProgressAggregator,
    ) -> UploadOutcome {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(f) => f,
            Err(e) => return UploadOutcome::Failed(format!("open {}: {}", path.display(), e)),
        };
        let total_size = match file.metadata().await {
            Ok(m) => m.len(),
            Err(e) => return UploadOutcome::Failed(format!("stat {}: {}", path.display(), e)),
        };
        if total_size == 0 {
            return UploadOutcome::Failed(format!("{} is empty", path.display()));
        }

        let service = &self.service;
        let handle = match run_with_retry(&self.retry, || service.begin_session(total_size, metadata)).await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not open upload session");
                return UploadOutcome::from_error(&e);
            }
        };
        tracing::debug!(path = %path.display(), total_size, "upload session opened");

        let mut session = UploadSession::new(path.to_path_buf(), total_size, self.chunk_size, handle);
        let outcome = self.drive(&mut session, &mut file, progress).await;
        session.terminal = true;
        outcome
    }

    async fn drive(
        &self,
        session: &mut UploadSession,
        file: &mut tokio::fs::File,
        progress: &ProgressAggregator,
    ) -> UploadOutcome {
        // Transient failures of the current chunk; reset on any forward progress.
        let mut attempts = 0u32;
        let mut confirm = false;

        loop {
            if confirm {
                match self.service.query_status(&session.handle, session.total_size).await {
                    Ok(ChunkResponse::Completed { remote_id }) => {
                        progress.advance_to(session.total_size);
                        return UploadOutcome::Uploaded { remote_id };
                    }
                    Ok(ChunkResponse::Progress { bytes_acked }) => {
                        let before = session.bytes_acked;
                        if let Err(msg) = self.accept(session, bytes_acked, progress) {
                            return UploadOutcome::Failed(msg);
                        }
                        // The service kept the lost reply's bytes; the budget restarts with the next chunk.
                        if session.bytes_acked > before {
                            attempts = 0;
                        }
                        confirm = false;
                    }
                    Err(e) => match self.after_failure(&mut attempts, &e, session.bytes_acked).await {
                        Some(outcome) => return outcome,
                        None => continue,
                    },
                }
            }

            let (offset, length) = session.next_chunk();
            let mut buf = vec![0u8; length as usize];
            let read = async {
                file.seek(SeekFrom::Start(offset)).await?;
                file.read_exact(&mut buf).await
            };
            if let Err(e) = read.await {
                return UploadOutcome::Failed(format!(
                    "read {} at {}: {}",
                    session.local_path.display(),
                    offset,
                    e
                ));
            }

            match self
                .service
                .send_chunk(&session.handle, offset, buf, session.total_size)
                .await
            {
                Ok(ChunkResponse::Completed { remote_id }) => {
                    progress.advance_to(session.total_size);
                    tracing::info!(remote_id = %remote_id, bytes = session.total_size, "upload complete");
                    return UploadOutcome::Uploaded { remote_id };
                }
                Ok(ChunkResponse::Progress { bytes_acked }) => {
                    let before = session.bytes_acked;
                    if let Err(msg) = self.accept(session, bytes_acked, progress) {
                        return UploadOutcome::Failed(msg);
                    }
                    if session.bytes_acked > before {
                        attempts = 0;
                    } else {
                        let stalled = UploadError::transient(format!(
                            "chunk at {} was not acknowledged",
                            offset
                        ));
                        if let Some(outcome) = self.after_failure(&mut attempts, &stalled, offset).await {
                            return outcome;
                        }
                        confirm = true;
                    }
                }
                Err(e) => {
                    if let Some(outcome) = self.after_failure(&mut attempts, &e, offset).await {
                        return outcome;
                    }
                    confirm = true;
                }
            }
        }
    }

    /// Apply an ack to the session. A full ack without completion is a violation.
    fn accept(
        &self,
        session: &mut UploadSession,
        bytes_acked: u64,
        progress: &ProgressAggregator,
    ) -> Result<(), String> {
        session.acknowledge(bytes_acked)?;
        if session.bytes_acked == session.total_size {
            return Err(format!(
                "service holds all {} bytes but did not complete the session",
                session.total_size
            ));
        }
        progress.advance_to(session.bytes_acked);
        Ok(())
    }

    /// Count a failure against the current chunk. `None` means back off and retry.
    async fn after_failure(&self, attempts: &mut u32, e: &UploadError, offset: u64) -> Option<UploadOutcome> {
        if e.kind() != ErrorKind::Transient {
            tracing::warn!(offset, error = %e, "upload rejected");
            return Some(UploadOutcome::from_error(e));
        }
        *attempts += 1;
        match self.retry.decide(*attempts, ErrorKind::Transient) {
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(
                    offset,
                    attempts = *attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "chunk failed; confirming session state before resuming"
                );
                tokio::time::sleep(delay).await;
                None
            }
            RetryDecision::NoRetry => {
                tracing::warn!(offset, attempts = *attempts, error = %e, "chunk retries exhausted");
                Some(UploadOutcome::Failed(format!(
                    "chunk at {} failed after {} attempts: {}",
                    offset, attempts, e
                )))
            }
        }
    }
}
