//! # Local Job Operations
//!
//! Cached job snapshots keyed by server id. A snapshot is the last payload
//! the server returned for that job; writing the same id again replaces it.

use super::{now_millis, LocalDatabase, Result};
use crate::shared::Job;
use sqlx::Row;

impl LocalDatabase {
    /// Insert or replace a job snapshot
    pub async fn put_job(&self, job: &Job) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO jobs (id, data, cached_at) VALUES (?, ?, ?)")
            .bind(&job.id)
            .bind(serde_json::to_string(&job.fields)?)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert or replace many job snapshots in one transaction
    pub async fn put_jobs(&self, jobs: &[Job]) -> Result<()> {
        let cached_at = now_millis();
        let mut tx = self.pool.begin().await?;

        for job in jobs {
            sqlx::query("INSERT OR REPLACE INTO jobs (id, data, cached_at) VALUES (?, ?, ?)")
                .bind(&job.id)
                .bind(serde_json::to_string(&job.fields)?)
                .bind(cached_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a job snapshot by id
    pub async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT id, data FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    /// Get every cached job snapshot
    pub async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT id, data FROM jobs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_job).collect()
    }

    /// Delete a job snapshot; deleting a missing id is a no-op
    pub async fn delete_job(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job> {
    let id: String = row.try_get("id")?;
    let data: String = row.try_get("data")?;
    let fields: serde_json::Value = serde_json::from_str(&data)?;
    Ok(Job::new(id, fields))
}
