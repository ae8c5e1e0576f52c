use std::path::PathBuf;

use super::SessionHandle;

/// Client-side view of one open upload session.
///
/// `bytes_acked` only moves forward and only to values the service reported.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub local_path: PathBuf,
    pub total_size: u64,
    pub bytes_acked: u64,
    pub chunk_size: u64,
    pub handle: SessionHandle,
    pub terminal: bool,
}

impl UploadSession {
    pub fn new(local_path: PathBuf, total_size: u64, chunk_size: u64, handle: SessionHandle) -> Self {
        Self {
            local_path,
            total_size,
            bytes_acked: 0,
            chunk_size,
            handle,
            terminal: false,
        }
    }

    /// Range of the next chunk to send: `(offset, length)`.
    pub fn next_chunk(&self) -> (u64, u64) {
        let remaining = self.total_size.saturating_sub(self.bytes_acked);
        (self.bytes_acked, remaining.min(self.chunk_size))
    }

    /// Accept an acknowledgement. Returns an error message for an ack that
    /// goes backwards or past the end of the object.
    pub fn acknowledge(&mut self, bytes_acked: u64) -> Result<(), String> {
        if bytes_acked < self.bytes_acked {
            return Err(format!(
                "service acknowledged {} bytes after {}",
                bytes_acked, self.bytes_acked
            ));
        }
        if bytes_acked > self.total_size {
            return Err(format!(
                "service acknowledged {} bytes of a {} byte object",
                bytes_acked, self.total_size
            ));
        }
        self.bytes_acked = bytes_acked;
        Ok(())
    }
}
