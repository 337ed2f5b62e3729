//! Request/query types (Deserialize)

use analysis_console_core::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT, MessageRole};
use serde::Deserialize;

const fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

const fn default_role() -> MessageRole {
    MessageRole::User
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl LimitQuery {
    /// Cap limit to prevent unbounded queries.
    pub fn capped_limit(&self) -> usize {
        self.limit.min(MAX_QUERY_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
    pub period_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub shared: bool,
}

#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    #[serde(default = "default_role")]
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub instruction: String,
    #[serde(default)]
    pub source_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub shared: bool,
}
