//! Unified storage backend with enum dispatch.

use analysis_console_core::{AnalysisResult, FollowUpMessage, NewFollowUpMessage, UploadRecord};
use async_trait::async_trait;

use crate::error::StorageError;
use crate::memory::MemoryStorage;
use crate::pg_storage::PgStorage;
use crate::traits::{AnalysisStore, ThreadStore, UploadStore};

macro_rules! dispatch {
    ($self:expr, $trait:path, $method:ident ( $($arg:expr),* $(,)? )) => {
        match $self {
            StorageBackend::Memory(s) => <MemoryStorage as $trait>::$method(s, $($arg),*).await,
            StorageBackend::Postgres(s) => <PgStorage as $trait>::$method(s, $($arg),*).await,
        }
    };
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    Memory(MemoryStorage),
    Postgres(PgStorage),
}

impl StorageBackend {
    #[must_use]
    pub fn new_memory() -> Self {
        Self::Memory(MemoryStorage::new())
    }

    pub async fn new_postgres(database_url: &str) -> Result<Self, StorageError> {
        Ok(Self::Postgres(PgStorage::new(database_url).await?))
    }

    /// Short backend name for logs and the version endpoint.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }
}

// ── AnalysisStore ────────────────────────────────────────────────

#[async_trait]
impl AnalysisStore for StorageBackend {
    async fn save_analysis(&self, analysis: &AnalysisResult) -> Result<(), StorageError> {
        dispatch!(self, AnalysisStore, save_analysis(analysis))
    }

    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisResult>, StorageError> {
        dispatch!(self, AnalysisStore, get_analysis(id))
    }

    async fn list_analyses(
        &self,
        client_id: &str,
        shared_only: bool,
        limit: usize,
    ) -> Result<Vec<AnalysisResult>, StorageError> {
        dispatch!(self, AnalysisStore, list_analyses(client_id, shared_only, limit))
    }

    async fn set_analysis_shared(&self, id: &str, shared: bool) -> Result<bool, StorageError> {
        dispatch!(self, AnalysisStore, set_analysis_shared(id, shared))
    }
}

// ── ThreadStore ──────────────────────────────────────────────────

#[async_trait]
impl ThreadStore for StorageBackend {
    async fn list_messages(
        &self,
        analysis_id: &str,
    ) -> Result<Vec<FollowUpMessage>, StorageError> {
        dispatch!(self, ThreadStore, list_messages(analysis_id))
    }

    async fn insert_message(
        &self,
        message: &NewFollowUpMessage,
    ) -> Result<FollowUpMessage, StorageError> {
        dispatch!(self, ThreadStore, insert_message(message))
    }

    async fn set_message_shared(&self, id: i64, shared: bool) -> Result<bool, StorageError> {
        dispatch!(self, ThreadStore, set_message_shared(id, shared))
    }

    async fn delete_thread(&self, analysis_id: &str) -> Result<usize, StorageError> {
        dispatch!(self, ThreadStore, delete_thread(analysis_id))
    }
}

// ── UploadStore ──────────────────────────────────────────────────

#[async_trait]
impl UploadStore for StorageBackend {
    async fn save_upload(&self, upload: &UploadRecord) -> Result<(), StorageError> {
        dispatch!(self, UploadStore, save_upload(upload))
    }

    async fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>, StorageError> {
        dispatch!(self, UploadStore, get_upload(id))
    }

    async fn list_uploads(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<UploadRecord>, StorageError> {
        dispatch!(self, UploadStore, list_uploads(client_id, limit))
    }

    async fn delete_upload(&self, id: &str) -> Result<bool, StorageError> {
        dispatch!(self, UploadStore, delete_upload(id))
    }
}
