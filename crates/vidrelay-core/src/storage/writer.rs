//! The `.part` file every segment worker writes into.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Preallocated transfer file. Each `write_at` is independent (pwrite-style),
/// so workers writing disjoint ranges never contend on a lock.
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
}

impl StorageWriter {
    /// Create `path` (truncating any leftover from an earlier run) and
    /// reserve `size` bytes so segments can land in any order.
    pub fn create_preallocated(path: &Path, size: u64) -> Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("create {}", path.display()))?;
        reserve(&file, size).with_context(|| format!("reserve {} bytes for {}", size, path.display()))?;
        Ok(Self { file: Arc::new(file) })
    }

    /// Writer on its own duplicated descriptor, one per worker.
    pub fn worker_handle(&self) -> Result<Self> {
        let file = self.file.try_clone().context("duplicate transfer file handle")?;
        Ok(Self { file: Arc::new(file) })
    }

    /// Write `data` at `offset` without touching the file cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    /// Flush data to disk before the file is handed to the uploader.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().context("sync transfer file")
    }
}

/// Real block allocation where the filesystem supports it, else a sparse `set_len`.
fn reserve(file: &File, size: u64) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let r = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, size as libc::off_t) };
        if r == 0 {
            return Ok(());
        }
        tracing::debug!(errno = r, size, "posix_fallocate unavailable; sizing with set_len");
    }
    file.set_len(size)
}
