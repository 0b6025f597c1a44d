//! # Local Photo Cache
//!
//! Raw image bytes captured in the field, kept until their upload succeeds
//! or the user discards them.

use super::{LocalDatabase, Result};
use crate::shared::Photo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl LocalDatabase {
    /// Insert or replace a cached photo
    pub async fn put_photo(&self, photo: &Photo) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO photos (id, job_id, content_type, data, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&photo.id)
        .bind(&photo.job_id)
        .bind(&photo.content_type)
        .bind(&photo.data)
        .bind(photo.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a cached photo by id
    pub async fn get_photo(&self, id: &str) -> Result<Option<Photo>> {
        let row = sqlx::query(
            "SELECT id, job_id, content_type, data, created_at FROM photos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_photo(&row)?)),
            None => Ok(None),
        }
    }

    /// Get every cached photo
    pub async fn get_all_photos(&self) -> Result<Vec<Photo>> {
        let rows = sqlx::query(
            "SELECT id, job_id, content_type, data, created_at FROM photos ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_photo).collect()
    }

    /// Delete a cached photo; deleting a missing id is a no-op
    pub async fn delete_photo(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn row_to_photo(row: &SqliteRow) -> Result<Photo> {
    Ok(Photo {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        content_type: row.try_get("content_type")?,
        data: row.try_get("data")?,
        created_at: row.try_get("created_at")?,
    })
}
