//! Storage layer for the analysis console
//!
//! PostgreSQL (sqlx) and in-memory backends behind async domain traits,
//! plus a filesystem blob store for uploads.

mod backend;
mod blob;
pub mod error;
mod memory;
mod pg_migrations;
mod pg_storage;
#[cfg(test)]
mod tests;
pub mod traits;

pub use backend::StorageBackend;
pub use blob::{BlobStore, LocalBlobStore};
pub use error::StorageError;
pub use memory::MemoryStorage;
pub use pg_migrations::run_pg_migrations;
pub use pg_storage::PgStorage;
pub use traits::{AnalysisStore, ThreadStore, UploadStore};
