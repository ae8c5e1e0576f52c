//! vidrelay core: segmented parallel download of a remote video followed by
//! a resumable chunked upload, one batch item at a time.

pub mod config;
pub mod control;
pub mod downloader;
pub mod ledger;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod segmenter;
pub mod source;
pub mod storage;
pub mod upload;
