//! ThreadStore implementation for PgStorage.

use analysis_console_core::NewFollowUpMessage;
use async_trait::async_trait;

use super::*;
use crate::traits::ThreadStore;

#[async_trait]
impl ThreadStore for PgStorage {
    async fn list_messages(
        &self,
        analysis_id: &str,
    ) -> Result<Vec<FollowUpMessage>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM followup_messages
               WHERE analysis_id = $1
               ORDER BY id ASC"
        ))
        .bind(analysis_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_message).collect()
    }

    async fn insert_message(
        &self,
        message: &NewFollowUpMessage,
    ) -> Result<FollowUpMessage, StorageError> {
        // The no-op DO UPDATE makes RETURNING yield the existing row on conflict,
        // which DO NOTHING would not.
        let row = sqlx::query(&format!(
            "INSERT INTO followup_messages (analysis_id, client_key, role, content, shared)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (client_key) DO UPDATE SET client_key = EXCLUDED.client_key
               RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(&message.analysis_id)
        .bind(message.client_key)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.shared)
        .fetch_one(&self.pool)
        .await?;
        row_to_message(&row)
    }

    async fn set_message_shared(&self, id: i64, shared: bool) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE followup_messages SET shared = $1 WHERE id = $2")
            .bind(shared)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_thread(&self, analysis_id: &str) -> Result<usize, StorageError> {
        let result = sqlx::query("DELETE FROM followup_messages WHERE analysis_id = $1")
            .bind(analysis_id)
            .execute(&self.pool)
            .await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }
}
