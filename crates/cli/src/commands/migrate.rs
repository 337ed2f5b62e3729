//! Apply the Postgres schema.
//!
//! Migrations are idempotent; connecting runs them, so this command only
//! needs to open the store and report.

use analysis_console_core::env_non_empty;
use analysis_console_storage::{PgStorage, run_pg_migrations};

pub(crate) async fn run() -> anyhow::Result<()> {
    let pg_url = env_non_empty("DATABASE_URL")
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for migrate"))?;
    let pg = PgStorage::new(&pg_url).await?;
    // Second pass confirms the schema is already current.
    run_pg_migrations(pg.pool()).await?;
    println!("Schema is up to date");
    Ok(())
}
