//! `vidrelay status` – show the ledger.

use anyhow::Result;
use vidrelay_core::ledger::{Ledger, LedgerEntry};

pub async fn run_status() -> Result<()> {
    let ledger = Ledger::open_default().await?;
    let entries = ledger.list().await?;
    if entries.is_empty() {
        println!("Ledger is empty.");
        return Ok(());
    }
    println!("{:<12} {:<14} {:<24} {}", "STATE", "REMOTE ID", "FILE", "SOURCE");
    for e in &entries {
        println!("{}", format_row(e));
        if let Some(reason) = &e.reason {
            println!("{:<12} reason: {}", "", reason);
        }
    }
    if entries.iter().any(|e| e.state.is_in_progress()) {
        println!("* interrupted mid-transfer (or running now); the next run starts it over");
    }
    Ok(())
}

fn format_row(e: &LedgerEntry) -> String {
    let state = if e.state.is_in_progress() {
        format!("{}*", e.state.as_str())
    } else {
        e.state.as_str().to_string()
    };
    format!(
        "{:<12} {:<14} {:<24} {}",
        state,
        e.remote_id.as_deref().unwrap_or("-"),
        e.filename.as_deref().unwrap_or("-"),
        e.source_ref
    )
}
