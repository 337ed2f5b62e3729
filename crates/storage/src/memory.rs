//! In-process storage backend.
//!
//! Used when no `DATABASE_URL` is configured and as the reference backend in
//! tests. Mirrors the Postgres constraints that callers rely on: message ids
//! increase with insertion order, inserts are idempotent on `client_key`, and
//! messages may only reference an existing analysis.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use analysis_console_core::{
    AnalysisResult, FollowUpMessage, NewFollowUpMessage, UploadRecord,
};
use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::traits::{AnalysisStore, ThreadStore, UploadStore};

#[derive(Debug, Default)]
struct Tables {
    analyses: HashMap<String, AnalysisResult>,
    /// Kept sorted by id, which is also insertion order.
    messages: Vec<FollowUpMessage>,
    next_message_id: i64,
    uploads: HashMap<String, UploadRecord>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Every mutation below completes before the guard drops, so a poisoned
        // lock still holds consistent tables.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AnalysisStore for MemoryStorage {
    async fn save_analysis(&self, analysis: &AnalysisResult) -> Result<(), StorageError> {
        self.tables().analyses.insert(analysis.id.clone(), analysis.clone());
        Ok(())
    }

    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisResult>, StorageError> {
        Ok(self.tables().analyses.get(id).cloned())
    }

    async fn list_analyses(
        &self,
        client_id: &str,
        shared_only: bool,
        limit: usize,
    ) -> Result<Vec<AnalysisResult>, StorageError> {
        let tables = self.tables();
        let mut items: Vec<AnalysisResult> = tables
            .analyses
            .values()
            .filter(|a| a.client_id == client_id && (!shared_only || a.shared_with_client))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        items.truncate(limit);
        Ok(items)
    }

    async fn set_analysis_shared(&self, id: &str, shared: bool) -> Result<bool, StorageError> {
        Ok(self
            .tables()
            .analyses
            .get_mut(id)
            .map(|a| a.shared_with_client = shared)
            .is_some())
    }
}

#[async_trait]
impl ThreadStore for MemoryStorage {
    async fn list_messages(
        &self,
        analysis_id: &str,
    ) -> Result<Vec<FollowUpMessage>, StorageError> {
        Ok(self
            .tables()
            .messages
            .iter()
            .filter(|m| m.analysis_id == analysis_id)
            .cloned()
            .collect())
    }

    async fn insert_message(
        &self,
        message: &NewFollowUpMessage,
    ) -> Result<FollowUpMessage, StorageError> {
        let mut tables = self.tables();
        if let Some(existing) = tables.messages.iter().find(|m| m.client_key == message.client_key)
        {
            return Ok(existing.clone());
        }
        if !tables.analyses.contains_key(&message.analysis_id) {
            return Err(StorageError::MissingReference(format!(
                "analysis {} does not exist",
                message.analysis_id
            )));
        }
        tables.next_message_id = tables.next_message_id.saturating_add(1);
        let row = FollowUpMessage {
            id: tables.next_message_id,
            analysis_id: message.analysis_id.clone(),
            client_key: message.client_key,
            role: message.role,
            content: message.content.clone(),
            shared: message.shared,
            created_at: Utc::now(),
        };
        tables.messages.push(row.clone());
        Ok(row)
    }

    async fn set_message_shared(&self, id: i64, shared: bool) -> Result<bool, StorageError> {
        Ok(self
            .tables()
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .map(|m| m.shared = shared)
            .is_some())
    }

    async fn delete_thread(&self, analysis_id: &str) -> Result<usize, StorageError> {
        let mut tables = self.tables();
        let before = tables.messages.len();
        tables.messages.retain(|m| m.analysis_id != analysis_id);
        Ok(before.saturating_sub(tables.messages.len()))
    }
}

#[async_trait]
impl UploadStore for MemoryStorage {
    async fn save_upload(&self, upload: &UploadRecord) -> Result<(), StorageError> {
        let mut tables = self.tables();
        if tables.uploads.contains_key(&upload.id) {
            return Err(StorageError::Duplicate(format!("upload {}", upload.id)));
        }
        tables.uploads.insert(upload.id.clone(), upload.clone());
        Ok(())
    }

    async fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>, StorageError> {
        Ok(self.tables().uploads.get(id).cloned())
    }

    async fn list_uploads(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<UploadRecord>, StorageError> {
        let tables = self.tables();
        let mut items: Vec<UploadRecord> =
            tables.uploads.values().filter(|u| u.client_id == client_id).cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        items.truncate(limit);
        Ok(items)
    }

    async fn delete_upload(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.tables().uploads.remove(id).is_some())
    }
}
