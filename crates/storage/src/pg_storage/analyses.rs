//! AnalysisStore implementation for PgStorage.

use async_trait::async_trait;

use super::*;
use crate::traits::AnalysisStore;

#[async_trait]
impl AnalysisStore for PgStorage {
    async fn save_analysis(&self, analysis: &AnalysisResult) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO analyses
               (id, agency_id, client_id, period_id, body, category, shared_with_client, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT (id) DO UPDATE SET
                 body = EXCLUDED.body,
                 category = EXCLUDED.category,
                 period_id = EXCLUDED.period_id,
                 shared_with_client = EXCLUDED.shared_with_client",
        )
        .bind(&analysis.id)
        .bind(&analysis.agency_id)
        .bind(&analysis.client_id)
        .bind(&analysis.period_id)
        .bind(&analysis.body)
        .bind(&analysis.category)
        .bind(analysis.shared_with_client)
        .bind(analysis.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisResult>, StorageError> {
        let row = sqlx::query(&format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_analysis).transpose()
    }

    async fn list_analyses(
        &self,
        client_id: &str,
        shared_only: bool,
        limit: usize,
    ) -> Result<Vec<AnalysisResult>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analyses
               WHERE client_id = $1 AND (NOT $2 OR shared_with_client)
               ORDER BY created_at DESC, id ASC
               LIMIT $3"
        ))
        .bind(client_id)
        .bind(shared_only)
        .bind(usize_to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_analysis).collect()
    }

    async fn set_analysis_shared(&self, id: &str, shared: bool) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE analyses SET shared_with_client = $1 WHERE id = $2")
            .bind(shared)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
