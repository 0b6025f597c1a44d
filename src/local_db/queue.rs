//! # Local Sync Queue Operations
//!
//! The pending-mutation queue. Rows are inserted by producers, read in
//! insertion order by the sync manager and deleted the moment their remote
//! call succeeds. Rows are never updated; failure bookkeeping lives in
//! `queue_attempts` and disappears with its row.

use super::{now_millis, LocalDatabase, Result};
use crate::shared::mutation::{AttemptState, MutationKind, NewQueueItem, QueueItem};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;

const QUEUE_COLUMNS: &str = "id, item_type, job_id, report_id, data, timestamp, synced";

impl LocalDatabase {
    /// Append a mutation to the queue, returning its id
    pub async fn enqueue(&self, item: NewQueueItem) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO sync_queue (item_type, job_id, report_id, data, timestamp, synced)
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(item.kind.as_str())
        .bind(&item.job_id)
        .bind(&item.report_id)
        .bind(serde_json::to_string(&item.data)?)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!("[LocalDb] Queued {} as item {}", item.kind, id);
        Ok(id)
    }

    /// Get a queued item by id
    pub async fn get_queue_item(&self, id: i64) -> Result<Option<QueueItem>> {
        let row = sqlx::query(&format!("SELECT {} FROM sync_queue WHERE id = ?", QUEUE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_queue_item(&row)?)),
            None => Ok(None),
        }
    }

    /// Get every queued item in insertion order
    pub async fn get_all_queue_items(&self) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(&format!("SELECT {} FROM sync_queue ORDER BY id ASC", QUEUE_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_queue_item).collect()
    }

    /// Delete a queued item and its attempt state; deleting a missing id is a no-op
    pub async fn delete_queue_item(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM queue_attempts WHERE item_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove every queued item
    ///
    /// Full-reset only; a drain never calls this.
    pub async fn clear_queue(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM queue_attempts").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM sync_queue").execute(&mut *tx).await?;

        tx.commit().await?;
        tracing::info!("[LocalDb] Sync queue cleared");
        Ok(())
    }

    /// Number of queued items
    pub async fn queue_len(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Attempt state of every item that has failed at least once
    pub async fn get_attempt_states(&self) -> Result<HashMap<i64, AttemptState>> {
        let rows = sqlx::query(
            "SELECT item_id, attempts, unknown_kind_hits, last_attempt, next_attempt_at, last_error
             FROM queue_attempts",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut states = HashMap::with_capacity(rows.len());
        for row in rows {
            let state = row_to_attempt_state(&row)?;
            states.insert(state.item_id, state);
        }
        Ok(states)
    }

    /// Get the attempt state of one item
    pub async fn get_attempt_state(&self, item_id: i64) -> Result<Option<AttemptState>> {
        let row = sqlx::query(
            "SELECT item_id, attempts, unknown_kind_hits, last_attempt, next_attempt_at, last_error
             FROM queue_attempts WHERE item_id = ?",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_attempt_state(&row)?)),
            None => Ok(None),
        }
    }

    /// Record a failed remote attempt for a queued item
    ///
    /// Increments the attempt counter and stores when the item becomes
    /// eligible again. Returns the updated state.
    pub async fn record_failure(
        &self,
        item_id: i64,
        error: &str,
        next_attempt_at: Option<i64>,
    ) -> Result<AttemptState> {
        let row = sqlx::query(
            "INSERT INTO queue_attempts (item_id, attempts, unknown_kind_hits, last_attempt, next_attempt_at, last_error)
             VALUES (?, 1, 0, ?, ?, ?)
             ON CONFLICT(item_id) DO UPDATE SET
                attempts = attempts + 1,
                last_attempt = excluded.last_attempt,
                next_attempt_at = excluded.next_attempt_at,
                last_error = excluded.last_error
             RETURNING item_id, attempts, unknown_kind_hits, last_attempt, next_attempt_at, last_error",
        )
        .bind(item_id)
        .bind(now_millis())
        .bind(next_attempt_at)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;

        row_to_attempt_state(&row)
    }

    /// Record that a drain found no handler for an item's kind
    ///
    /// Returns the number of drains that have done so.
    pub async fn record_unknown_kind(&self, item_id: i64) -> Result<u32> {
        let (hits,): (i64,) = sqlx::query_as(
            "INSERT INTO queue_attempts (item_id, attempts, unknown_kind_hits, last_attempt)
             VALUES (?, 0, 1, ?)
             ON CONFLICT(item_id) DO UPDATE SET
                unknown_kind_hits = unknown_kind_hits + 1,
                last_attempt = excluded.last_attempt
             RETURNING unknown_kind_hits",
        )
        .bind(item_id)
        .bind(now_millis())
        .fetch_one(&self.pool)
        .await?;

        Ok(hits as u32)
    }
}

pub(crate) fn row_to_queue_item(row: &SqliteRow) -> Result<QueueItem> {
    let item_type: String = row.try_get("item_type")?;
    let data: String = row.try_get("data")?;

    Ok(QueueItem {
        id: row.try_get("id")?,
        kind: MutationKind::parse(&item_type),
        job_id: row.try_get("job_id")?,
        report_id: row.try_get("report_id")?,
        data: serde_json::from_str(&data)?,
        timestamp: row.try_get("timestamp")?,
        synced: row.try_get("synced")?,
    })
}

fn row_to_attempt_state(row: &SqliteRow) -> Result<AttemptState> {
    let attempts: i64 = row.try_get("attempts")?;
    let unknown_kind_hits: i64 = row.try_get("unknown_kind_hits")?;

    Ok(AttemptState {
        item_id: row.try_get("item_id")?,
        attempts: attempts as u32,
        unknown_kind_hits: unknown_kind_hits as u32,
        last_attempt: row.try_get("last_attempt")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        last_error: row.try_get("last_error")?,
    })
}
