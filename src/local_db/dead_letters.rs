//! # Dead Letters
//!
//! Mutations moved out of the sync queue because they have no handler or
//! because the retry policy gave up on them. An operator can inspect them,
//! push them back onto the queue or discard them.

use super::{now_millis, LocalDatabase, Result};
use crate::shared::mutation::{DeadLetter, DeadLetterReason, MutationKind, QueueItem};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl LocalDatabase {
    /// Move a queued item to the dead-letter table
    ///
    /// Insert and delete happen in one transaction, so the item is never in
    /// both places or in neither. Returns the dead-letter id.
    pub async fn dead_letter(
        &self,
        item: &QueueItem,
        reason: DeadLetterReason,
        attempts: u32,
        last_error: Option<&str>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO dead_letters (
                original_id, item_type, job_id, report_id, data, timestamp,
                attempts, reason, last_error, failed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.id)
        .bind(item.kind.as_str())
        .bind(&item.job_id)
        .bind(&item.report_id)
        .bind(serde_json::to_string(&item.data)?)
        .bind(item.timestamp)
        .bind(attempts as i64)
        .bind(reason.as_str())
        .bind(last_error)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM queue_attempts WHERE item_id = ?")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let id = result.last_insert_rowid();
        tracing::warn!(
            "[LocalDb] Dead-lettered item {} ({}) as {}: {}",
            item.id,
            item.kind,
            id,
            reason.as_str()
        );
        Ok(id)
    }

    /// Every dead letter, oldest first
    pub async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let rows = sqlx::query(
            "SELECT id, original_id, item_type, job_id, report_id, data, timestamp,
                    attempts, reason, last_error, failed_at
             FROM dead_letters ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_dead_letter).collect()
    }

    /// Put a dead letter back at the tail of the queue with fresh attempt state
    ///
    /// Returns the new queue id, or `None` if no such dead letter exists.
    pub async fn requeue_dead_letter(&self, id: i64) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT item_type, job_id, report_id, data FROM dead_letters WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_type: String = row.try_get("item_type")?;
        let job_id: Option<String> = row.try_get("job_id")?;
        let report_id: Option<String> = row.try_get("report_id")?;
        let data: String = row.try_get("data")?;

        let result = sqlx::query(
            "INSERT INTO sync_queue (item_type, job_id, report_id, data, timestamp, synced)
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&item_type)
        .bind(job_id)
        .bind(report_id)
        .bind(data)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM dead_letters WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let queue_id = result.last_insert_rowid();
        tracing::info!("[LocalDb] Requeued dead letter {} ({}) as item {}", id, item_type, queue_id);
        Ok(Some(queue_id))
    }

    /// Discard a dead letter; deleting a missing id is a no-op
    pub async fn delete_dead_letter(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM dead_letters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn row_to_dead_letter(row: &SqliteRow) -> Result<DeadLetter> {
    let item_type: String = row.try_get("item_type")?;
    let data: String = row.try_get("data")?;
    let reason: String = row.try_get("reason")?;
    let attempts: i64 = row.try_get("attempts")?;

    let reason = DeadLetterReason::parse(&reason)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown dead-letter reason '{}'", reason).into()))?;

    Ok(DeadLetter {
        id: row.try_get("id")?,
        item: QueueItem {
            id: row.try_get("original_id")?,
            kind: MutationKind::parse(&item_type),
            job_id: row.try_get("job_id")?,
            report_id: row.try_get("report_id")?,
            data: serde_json::from_str(&data)?,
            timestamp: row.try_get("timestamp")?,
            synced: false,
        },
        attempts: attempts as u32,
        reason,
        last_error: row.try_get("last_error")?,
        failed_at: row.try_get("failed_at")?,
    })
}
