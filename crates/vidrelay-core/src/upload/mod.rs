//! Resumable chunked upload to a remote video service.
//!
//! `ResumableUploader` drives the session; the wire protocol lives behind
//! `RemoteUploadService` so tests can script the service's replies.

mod http;
mod metadata;
mod playlist;
mod protocol;
mod resumable;
mod session;

pub use http::{HttpUploadService, DEFAULT_UPLOAD_ENDPOINT};
pub use metadata::{Privacy, VideoMetadata, DEFAULT_CATEGORY_ID};
pub use playlist::{PlaylistClient, DEFAULT_DATA_API};
pub use resumable::{ResumableUploader, UploadOutcome, DEFAULT_CHUNK_SIZE};
pub use session::UploadSession;

use async_trait::async_trait;

use crate::retry::{Classify, ErrorKind};

/// Opaque handle to an open upload session (for HTTP, the session URI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle(pub String);

impl SessionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Service reply to a chunk or a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResponse {
    /// Session still open; the service holds `[0, bytes_acked)`.
    Progress { bytes_acked: u64 },
    /// All bytes received; the service assigned `remote_id`.
    Completed { remote_id: String },
}

/// Remote side of the resumable protocol.
#[async_trait]
pub trait RemoteUploadService: Send + Sync {
    /// Open a session for an object of `total_size` bytes.
    async fn begin_session(
        &self,
        total_size: u64,
        metadata: &VideoMetadata,
    ) -> Result<SessionHandle, UploadError>;

    /// Send `bytes` starting at `offset`.
    async fn send_chunk(
        &self,
        handle: &SessionHandle,
        offset: u64,
        bytes: Vec<u8>,
        total_size: u64,
    ) -> Result<ChunkResponse, UploadError>;

    /// Ask how many bytes the service holds for this session.
    async fn query_status(
        &self,
        handle: &SessionHandle,
        total_size: u64,
    ) -> Result<ChunkResponse, UploadError>;
}

/// Error from the upload service, classified for the retry policy.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} ({})", .kind.as_str())]
pub struct UploadError {
    pub kind: ErrorKind,
    pub message: String,
}

impl UploadError {
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

impl Classify for UploadError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}
