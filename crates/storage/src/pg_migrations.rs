//! PostgreSQL schema migrations for the analysis console.
//!
//! Every statement is idempotent so migrations run on each connect.

use sqlx::PgPool;

use crate::error::StorageError;

/// Run all PostgreSQL migrations.
pub async fn run_pg_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id TEXT PRIMARY KEY,
            agency_id TEXT NOT NULL,
            client_id TEXT NOT NULL,
            period_id TEXT,
            body TEXT NOT NULL,
            category TEXT NOT NULL,
            shared_with_client BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analyses_client ON analyses (client_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    // Follow-up threads. BIGSERIAL ids double as the creation order;
    // client_key makes inserts idempotent across retries.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS followup_messages (
            id BIGSERIAL PRIMARY KEY,
            analysis_id TEXT NOT NULL REFERENCES analyses (id) ON DELETE CASCADE,
            client_key UUID NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
            content TEXT NOT NULL,
            shared BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_followup_client_key ON followup_messages (client_key)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_followup_analysis ON followup_messages (analysis_id, id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS uploads (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            period_id TEXT,
            file_name TEXT NOT NULL,
            blob_path TEXT NOT NULL UNIQUE,
            content_type TEXT,
            size_bytes BIGINT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_uploads_client ON uploads (client_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("PostgreSQL migrations applied");
    Ok(())
}
