//! Progress reporting for transfers (bytes done, rate, ETA).
//!
//! One `ProgressAggregator` per transfer phase is shared by every worker; it
//! keeps an exact, clamped byte count under a single mutex and forwards
//! rate-limited `ProgressStats` snapshots to an optional channel.

mod aggregator;
mod stats;

pub use aggregator::{ProgressAggregator, DEFAULT_REPORT_INTERVAL};
pub use stats::{ProgressPhase, ProgressStats};
