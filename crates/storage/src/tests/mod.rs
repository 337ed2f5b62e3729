//! Test utilities and module declarations for storage tests.

use analysis_console_core::{AnalysisResult, MessageRole, NewFollowUpMessage};
use uuid::Uuid;

use crate::MemoryStorage;
use crate::traits::AnalysisStore;

pub fn create_test_analysis(id: &str, client_id: &str) -> AnalysisResult {
    AnalysisResult::new(
        id.to_owned(),
        "agency-1".to_owned(),
        client_id.to_owned(),
        Some("2026-Q3".to_owned()),
        format!("Analysis body {id}"),
        "performance".to_owned(),
    )
}

pub fn new_message(analysis_id: &str, role: MessageRole, content: &str) -> NewFollowUpMessage {
    NewFollowUpMessage {
        analysis_id: analysis_id.to_owned(),
        client_key: Uuid::new_v4(),
        role,
        content: content.to_owned(),
        shared: false,
    }
}

pub async fn storage_with_analysis(id: &str) -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage.save_analysis(&create_test_analysis(id, "client-1")).await.unwrap();
    storage
}

mod analysis_tests;
