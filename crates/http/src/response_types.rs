//! Response types (Serialize)

use analysis_console_service::{ReconcileReport, ThreadView};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub storage: &'static str,
    pub generation_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct AppendMessageResponse {
    pub index: usize,
    pub thread: ThreadView,
    /// Set when the message is kept locally but could not be persisted yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub report: ReconcileReport,
    pub thread: ThreadView,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct DetachResponse {
    pub detached: bool,
}
