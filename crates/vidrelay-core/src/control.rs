//! Cancellation for a batch and its transfers: shared abort tokens.
//!
//! The CLI hands one `AbortToken` to the orchestrator (set on Ctrl-C). The
//! orchestrator checks it between items and passes it down to the segment
//! worker pool, which stops dispatching new segments once it is set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable abort flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    flag: Arc<AtomicBool>,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort. In-flight work may finish; nothing new is dispatched.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
