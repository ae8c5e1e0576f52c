//! Range math and segment planning.
//!
//! Splits a transfer of known size into fixed-size byte ranges and tracks the
//! per-segment status and attempt count while the worker pool runs.

mod range;
mod table;

pub use range::{plan_segments, Segment};
pub use table::SegmentTable;
