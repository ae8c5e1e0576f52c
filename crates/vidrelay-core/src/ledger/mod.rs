//! Persistent batch ledger (SQLite via sqlx).
//!
//! One row per source reference: where the item got to, the remote id once
//! uploaded and the reason of a failure. Re-running a manifest consults the
//! ledger so finished items are not uploaded twice.

mod db;
mod entries;
mod types;


pub use db::Ledger;
pub use types::{LedgerEntry, LedgerState};
