//! Retry and backoff policy.
//!
//! This module encapsulates error classification (transient, fatal quota,
//! fatal auth, permanent) and backoff decisions so that the segment
//! downloader and the resumable uploader share one consistent policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify_curl_error, classify_http_status, classify_upload_rejection};
pub use error::Classify;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
