//! RAII guard that removes an item's local artifacts.

use std::path::{Path, PathBuf};

use crate::storage::remove_artifact;

/// Removes every tracked path when dropped, unless `cleanup` already ran.
///
/// The orchestrator calls `cleanup` on every normal exit; the `Drop` impl
/// covers early returns and cancelled futures.
#[derive(Debug, Default)]
pub struct ArtifactGuard {
    paths: Vec<PathBuf>,
    done: bool,
}

impl ArtifactGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Remove tracked files now. Failures are logged, never returned.
    pub async fn cleanup(mut self) -> usize {
        self.done = true;
        let mut removed = 0;
        for path in &self.paths {
            match remove_artifact(path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove artifact"),
            }
        }
        removed
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        for path in &self.paths {
            remove_quietly(path);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "could not remove artifact");
        }
    }
}
