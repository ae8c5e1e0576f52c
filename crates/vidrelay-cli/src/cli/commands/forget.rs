//! `vidrelay forget <source>` – drop a ledger row.

use anyhow::Result;
use vidrelay_core::ledger::Ledger;

pub async fn run_forget(source: &str) -> Result<()> {
    let ledger = Ledger::open_default().await?;
    if !ledger.remove(source).await? {
        anyhow::bail!("{} is not in the ledger", source);
    }
    println!("Forgot {}", source);
    Ok(())
}
