//! Progress snapshot sent to the CLI.
//!
//! Consumers can compute rate = bytes_done / elapsed_secs and
//! ETA = (total_bytes - bytes_done) / rate.

/// Which half of the pipeline a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Download,
    Upload,
}

impl ProgressPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressPhase::Download => "download",
            ProgressPhase::Upload => "upload",
        }
    }
}

/// Snapshot of progress for one transfer phase (CLI-friendly).
#[derive(Debug, Clone)]
pub struct ProgressStats {
    pub phase: ProgressPhase,
    /// Bytes delivered (download) or acknowledged (upload) so far.
    pub bytes_done: u64,
    /// Total object size in bytes.
    pub total_bytes: u64,
    /// Elapsed time since the phase started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Average rate in bytes per second since start (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_bytes.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_done >= self.total_bytes
    }
}
