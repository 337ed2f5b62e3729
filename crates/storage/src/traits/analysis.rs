use analysis_console_core::AnalysisResult;
use async_trait::async_trait;

use crate::error::StorageError;

/// Analysis result operations.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Insert or replace an analysis.
    async fn save_analysis(&self, analysis: &AnalysisResult) -> Result<(), StorageError>;

    /// Get analysis by ID.
    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisResult>, StorageError>;

    /// Newest-first analyses for a client, optionally only those shared with it.
    async fn list_analyses(
        &self,
        client_id: &str,
        shared_only: bool,
        limit: usize,
    ) -> Result<Vec<AnalysisResult>, StorageError>;

    /// Set the "shared with client" flag. Returns `false` if no such analysis.
    async fn set_analysis_shared(&self, id: &str, shared: bool) -> Result<bool, StorageError>;
}
