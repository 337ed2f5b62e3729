use anyhow::Result;
use std::sync::Arc;

use analysis_console_core::sync_call_timeout;
use analysis_console_service::ThreadSynchronizer;
use analysis_console_storage::{AnalysisStore, ThreadStore};

use crate::open_storage;

pub(crate) async fn run(analysis_id: &str) -> Result<()> {
    let storage = Arc::new(open_storage().await?);
    if storage.get_analysis(analysis_id).await?.is_none() {
        anyhow::bail!("Analysis not found: {analysis_id}");
    }
    let threads = ThreadSynchronizer::new(storage as Arc<dyn ThreadStore>, sync_call_timeout());
    let view = threads.load_thread(analysis_id).await;
    if let Some(err) = &view.load_error {
        anyhow::bail!("Failed to load thread: {err}");
    }
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
