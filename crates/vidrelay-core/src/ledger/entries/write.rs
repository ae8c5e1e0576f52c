use anyhow::Result;

use super::super::db::{unix_timestamp, Ledger};
use super::super::types::LedgerState;

impl Ledger {
    /// Insert or move `source_ref` to a non-terminal `state`. Clears any earlier
    /// failure reason; keeps the stored filename when `filename` is `None`.
    pub async fn record_state(
        &self,
        source_ref: &str,
        filename: Option<&str>,
        state: LedgerState,
    ) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO items (source_ref, filename, state, remote_id, reason, created_at, updated_at)
            VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?4)
            ON CONFLICT(source_ref) DO UPDATE SET
                filename = COALESCE(excluded.filename, items.filename),
                state = excluded.state,
                reason = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source_ref)
        .bind(filename)
        .bind(state.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a terminal state with the remote id (on success) or reason (on failure).
    pub async fn record_result(
        &self,
        source_ref: &str,
        state: LedgerState,
        remote_id: Option<&str>,
        reason: Option<&str>,
    ) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO items (source_ref, filename, state, remote_id, reason, created_at, updated_at)
            VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(source_ref) DO UPDATE SET
                state = excluded.state,
                remote_id = COALESCE(excluded.remote_id, items.remote_id),
                reason = excluded.reason,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source_ref)
        .bind(state.as_str())
        .bind(remote_id)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop the row for `source_ref`. Returns whether a row existed.
    pub async fn remove(&self, source_ref: &str) -> Result<bool> {
        let r = sqlx::query("DELETE FROM items WHERE source_ref = ?1")
            .bind(source_ref)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Reset rows left `downloading`/`uploading` by a crashed run to `pending`.
    /// Returns the number of rows reset.
    pub async fn recover_in_progress(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE items
            SET state = 'pending',
                updated_at = ?1
            WHERE state IN ('downloading', 'uploading')
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }
}
