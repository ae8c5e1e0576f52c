//! Disk I/O and local artifact lifecycle.
//!
//! Preallocates the transfer file, gives every download worker its own
//! positioned writer (pwrite) and removes artifacts after the item finishes.
//! The orchestrator renames `.part` to the final name.

mod sanitize;
mod writer;

pub use sanitize::sanitize_filename;
pub use writer::StorageWriter;

use std::path::{Path, PathBuf};

/// Temporary file suffix used before the rename to the final name.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `video.mp4` → `video.mp4.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Removes a local artifact if it exists. Returns true if a file was removed.
pub async fn remove_artifact(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
