//! UploadStore implementation for PgStorage.

use async_trait::async_trait;

use super::*;
use crate::traits::UploadStore;

#[async_trait]
impl UploadStore for PgStorage {
    async fn save_upload(&self, upload: &UploadRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO uploads
               (id, client_id, period_id, file_name, blob_path, content_type, size_bytes, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&upload.id)
        .bind(&upload.client_id)
        .bind(&upload.period_id)
        .bind(&upload.file_name)
        .bind(&upload.blob_path)
        .bind(&upload.content_type)
        .bind(upload.size_bytes)
        .bind(upload.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>, StorageError> {
        let row = sqlx::query(&format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_upload).transpose()
    }

    async fn list_uploads(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<UploadRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads
               WHERE client_id = $1
               ORDER BY created_at DESC, id ASC
               LIMIT $2"
        ))
        .bind(client_id)
        .bind(usize_to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_upload).collect()
    }

    async fn delete_upload(&self, id: &str) -> Result<bool, StorageError> {
        let result =
            sqlx::query("DELETE FROM uploads WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
