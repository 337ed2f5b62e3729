use std::sync::Arc;

use analysis_console_core::{MAX_QUERY_LIMIT, MAX_UPLOAD_BYTES, UploadRecord, sanitize_file_name};
use analysis_console_storage::{BlobStore, UploadStore};
use chrono::Utc;
use tokio::sync::broadcast;

use crate::ServiceError;
use crate::events::{ConsoleEvent, publish};

/// A file received from a client, before it is stored.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub client_id: String,
    pub period_id: Option<String>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Uploads span two stores: bytes in the blob store, metadata in the
/// relational store. Each operation orders the two writes so a failure
/// never leaves metadata pointing at a missing blob.
pub struct UploadService {
    uploads: Arc<dyn UploadStore>,
    blobs: Arc<dyn BlobStore>,
    event_tx: Option<broadcast::Sender<String>>,
}

fn blob_path(client_id: &str, upload_id: &str, file_name: &str) -> String {
    format!("{}/{upload_id}/{}", sanitize_file_name(client_id), sanitize_file_name(file_name))
}

impl UploadService {
    #[must_use]
    pub fn new(uploads: Arc<dyn UploadStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { uploads, blobs, event_tx: None }
    }

    #[must_use]
    pub fn with_events(mut self, event_tx: broadcast::Sender<String>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Write the blob, then its metadata row.
    ///
    /// If the metadata insert fails the blob is deleted again and the insert
    /// error is returned.
    pub async fn upload(&self, upload: NewUpload) -> Result<UploadRecord, ServiceError> {
        if upload.client_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("client_id is empty".to_owned()));
        }
        if upload.bytes.is_empty() {
            return Err(ServiceError::InvalidInput("upload is empty".to_owned()));
        }
        if upload.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ServiceError::InvalidInput(format!(
                "upload exceeds {MAX_UPLOAD_BYTES} bytes"
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let record = UploadRecord {
            blob_path: blob_path(&upload.client_id, &id, &upload.file_name),
            id,
            client_id: upload.client_id,
            period_id: upload.period_id,
            file_name: upload.file_name,
            content_type: upload.content_type,
            size_bytes: i64::try_from(upload.bytes.len()).unwrap_or(i64::MAX),
            created_at: Utc::now(),
        };

        self.blobs.put(&record.blob_path, &upload.bytes).await?;
        if let Err(e) = self.uploads.save_upload(&record).await {
            tracing::warn!(upload_id = %record.id, error = %e, "upload metadata insert failed, removing blob");
            if let Err(cleanup) = self.blobs.delete(&record.blob_path).await {
                tracing::error!(
                    upload_id = %record.id,
                    path = %record.blob_path,
                    error = %cleanup,
                    "compensating blob delete failed; blob is orphaned"
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            upload_id = %record.id,
            client_id = %record.client_id,
            size = record.size_bytes,
            "upload stored"
        );
        publish(
            self.event_tx.as_ref(),
            &ConsoleEvent::UploadCreated {
                upload_id: record.id.clone(),
                client_id: record.client_id.clone(),
            },
        );
        Ok(record)
    }

    pub async fn list(&self, client_id: &str, limit: usize) -> Result<Vec<UploadRecord>, ServiceError> {
        Ok(self.uploads.list_uploads(client_id, limit.min(MAX_QUERY_LIMIT)).await?)
    }

    /// Metadata and bytes of one upload.
    pub async fn download(&self, id: &str) -> Result<(UploadRecord, Vec<u8>), ServiceError> {
        let record = self
            .uploads
            .get_upload(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("upload {id}")))?;
        let bytes = self.blobs.get(&record.blob_path).await?;
        Ok((record, bytes))
    }

    /// Delete the metadata row, then the blob.
    ///
    /// A blob that cannot be removed is logged and left behind; the upload is
    /// gone from every listing either way.
    pub async fn delete(&self, id: &str) -> Result<UploadRecord, ServiceError> {
        let record = self
            .uploads
            .get_upload(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("upload {id}")))?;
        if !self.uploads.delete_upload(id).await? {
            return Err(ServiceError::NotFound(format!("upload {id}")));
        }
        match self.blobs.delete(&record.blob_path).await {
            Ok(true) => {},
            Ok(false) => tracing::warn!(upload_id = id, path = %record.blob_path, "blob already missing"),
            Err(e) => tracing::error!(
                upload_id = id,
                path = %record.blob_path,
                error = %e,
                "blob delete failed; blob is orphaned"
            ),
        }
        publish(
            self.event_tx.as_ref(),
            &ConsoleEvent::UploadDeleted {
                upload_id: record.id.clone(),
                client_id: record.client_id.clone(),
            },
        );
        Ok(record)
    }
}
