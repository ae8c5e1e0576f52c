use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::super::db::Ledger;
use super::super::types::{LedgerEntry, LedgerState};

fn entry_from_row(row: &SqliteRow) -> LedgerEntry {
    let state: String = row.get("state");
    LedgerEntry {
        source_ref: row.get("source_ref"),
        filename: row.get("filename"),
        state: LedgerState::from_str(&state),
        remote_id: row.get("remote_id"),
        reason: row.get("reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl Ledger {
    /// Row for `source_ref`, if any.
    pub async fn get(&self, source_ref: &str) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(
            r#"
            SELECT source_ref, filename, state, remote_id, reason, created_at, updated_at
            FROM items
            WHERE source_ref = ?1
            "#,
        )
        .bind(source_ref)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(entry_from_row))
    }

    /// All rows, oldest first.
    pub async fn list(&self) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT source_ref, filename, state, remote_id, reason, created_at, updated_at
            FROM items
            ORDER BY created_at ASC, source_ref ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }
}
