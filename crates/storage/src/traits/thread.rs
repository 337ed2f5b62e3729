use analysis_console_core::{FollowUpMessage, NewFollowUpMessage};
use async_trait::async_trait;

use crate::error::StorageError;

/// Follow-up thread rows.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// All rows for an analysis in creation order.
    async fn list_messages(&self, analysis_id: &str)
    -> Result<Vec<FollowUpMessage>, StorageError>;

    /// Persist one message and return the stored row.
    ///
    /// Idempotent on `client_key`: if a row with that key already exists it is
    /// returned unchanged and no second row is created.
    async fn insert_message(
        &self,
        message: &NewFollowUpMessage,
    ) -> Result<FollowUpMessage, StorageError>;

    /// Set the shared flag on one row. Returns `false` if the row is gone.
    async fn set_message_shared(&self, id: i64, shared: bool) -> Result<bool, StorageError>;

    /// Delete every row of an analysis. Returns the number of rows removed.
    async fn delete_thread(&self, analysis_id: &str) -> Result<usize, StorageError>;
}
