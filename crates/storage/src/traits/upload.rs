use analysis_console_core::UploadRecord;
use async_trait::async_trait;

use crate::error::StorageError;

/// Upload metadata operations. File bytes live in a [`crate::BlobStore`].
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Insert upload metadata. Fails with `Duplicate` if the id exists.
    async fn save_upload(&self, upload: &UploadRecord) -> Result<(), StorageError>;

    /// Get upload metadata by ID.
    async fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>, StorageError>;

    /// Newest-first uploads for a client.
    async fn list_uploads(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<UploadRecord>, StorageError>;

    /// Delete upload metadata. Returns `true` if a row was deleted.
    async fn delete_upload(&self, id: &str) -> Result<bool, StorageError>;
}
