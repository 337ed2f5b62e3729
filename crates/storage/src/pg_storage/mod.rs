//! PostgreSQL storage backend using sqlx.
//!
//! Split into modular files by domain concern.

#![allow(clippy::absolute_paths, reason = "std paths in error handling are clear")]

mod analyses;
mod threads;
mod uploads;

use analysis_console_core::{
    AnalysisResult, FollowUpMessage, MessageRole, PG_POOL_ACQUIRE_TIMEOUT_SECS,
    PG_POOL_IDLE_TIMEOUT_SECS, PG_POOL_MAX_CONNECTIONS, UploadRecord,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::StorageError;
use crate::pg_migrations::run_pg_migrations;

#[derive(Clone, Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(std::time::Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(std::time::Duration::from_secs(PG_POOL_IDLE_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        run_pg_migrations(&pool).await.map_err(|e| StorageError::Migration(e.to_string()))?;
        tracing::info!("PgStorage initialized");
        Ok(Self { pool })
    }

    /// Underlying pool, for the CLI `migrate` command and integration tests.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Convert `usize` to `i64` for SQL LIMIT binds.
/// Saturates to `i64::MAX` on overflow (only possible on 128-bit targets).
pub(crate) fn usize_to_i64(val: usize) -> i64 {
    i64::try_from(val).unwrap_or(i64::MAX)
}

pub(crate) const ANALYSIS_COLUMNS: &str =
    "id, agency_id, client_id, period_id, body, category, shared_with_client, created_at";

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, analysis_id, client_key, role, content, shared, created_at";

pub(crate) const UPLOAD_COLUMNS: &str =
    "id, client_id, period_id, file_name, blob_path, content_type, size_bytes, created_at";

pub(crate) fn row_to_analysis(
    row: &sqlx::postgres::PgRow,
) -> Result<AnalysisResult, StorageError> {
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(AnalysisResult {
        id: row.try_get("id")?,
        agency_id: row.try_get("agency_id")?,
        client_id: row.try_get("client_id")?,
        period_id: row.try_get("period_id")?,
        body: row.try_get("body")?,
        category: row.try_get("category")?,
        shared_with_client: row.try_get("shared_with_client")?,
        created_at,
    })
}

/// An unknown role is reported as corruption, never defaulted: it would shift
/// every assistant ordinal after it.
pub(crate) fn row_to_message(
    row: &sqlx::postgres::PgRow,
) -> Result<FollowUpMessage, StorageError> {
    let role_str: String = row.try_get("role")?;
    let role: MessageRole = role_str.parse()?;
    Ok(FollowUpMessage {
        id: row.try_get("id")?,
        analysis_id: row.try_get("analysis_id")?,
        client_key: row.try_get("client_key")?,
        role,
        content: row.try_get("content")?,
        shared: row.try_get("shared")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn row_to_upload(row: &sqlx::postgres::PgRow) -> Result<UploadRecord, StorageError> {
    Ok(UploadRecord {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        period_id: row.try_get("period_id")?,
        file_name: row.try_get("file_name")?,
        blob_path: row.try_get("blob_path")?,
        content_type: row.try_get("content_type")?,
        size_bytes: row.try_get("size_bytes")?,
        created_at: row.try_get("created_at")?,
    })
}
