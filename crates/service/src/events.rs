//! Change notifications published to SSE subscribers.

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleEvent {
    AnalysisCreated { analysis_id: String, client_id: String },
    AnalysisVisibility { analysis_id: String, shared: bool },
    MessagePersisted { analysis_id: String, message_id: i64, role: String },
    MessageShared { analysis_id: String, message_id: i64, shared: bool },
    ThreadCleared { analysis_id: String, removed: usize },
    UploadCreated { upload_id: String, client_id: String },
    UploadDeleted { upload_id: String, client_id: String },
}

/// Publish an event. No subscribers is the normal idle state, not an error.
pub(crate) fn publish(tx: Option<&broadcast::Sender<String>>, event: &ConsoleEvent) {
    let Some(tx) = tx else { return };
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(json);
        },
        Err(e) => tracing::warn!(error = %e, "failed to serialize console event"),
    }
}
