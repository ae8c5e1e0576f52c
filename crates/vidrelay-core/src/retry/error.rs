//! Classification seam for retryable errors.

use super::policy::ErrorKind;

/// Errors that carry a retry classification.
///
/// Implemented by source and upload errors so `run_with_retry` and the worker
/// pool can decide without knowing the concrete transport.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
