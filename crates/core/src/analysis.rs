use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generated analysis text attached to a client, optionally for a single period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisResult {
    pub id: String,
    pub agency_id: String,
    pub client_id: String,
    pub period_id: Option<String>,
    pub body: String,
    pub category: String,
    pub shared_with_client: bool,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Creates a new unshared analysis stamped with the current time.
    #[must_use]
    pub fn new(
        id: String,
        agency_id: String,
        client_id: String,
        period_id: Option<String>,
        body: String,
        category: String,
    ) -> Self {
        Self {
            id,
            agency_id,
            client_id,
            period_id,
            body,
            category,
            shared_with_client: false,
            created_at: Utc::now(),
        }
    }
}

/// Input for generating a new analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub agency_id: String,
    pub period_id: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    /// Instruction text sent to the generation endpoint.
    pub instruction: String,
    /// Structured period/upload data, passed through to the prompt as JSON.
    #[serde(default)]
    pub source_data: serde_json::Value,
}

fn default_category() -> String {
    "general".to_owned()
}
