use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

use analysis_console_core::{EVENT_CHANNEL_CAPACITY, sync_call_timeout, thread_idle_timeout};
use analysis_console_http::{AppState, create_router, start_thread_eviction};
use analysis_console_service::{AnalysisService, ThreadSynchronizer, UploadService};
use analysis_console_storage::{LocalBlobStore, ThreadStore, UploadStore};

use crate::{get_blob_dir, open_llm, open_storage};

pub(crate) async fn run(port: u16, host: String) -> Result<()> {
    let storage = Arc::new(open_storage().await?);
    let llm = open_llm()?;
    let blob_dir = get_blob_dir();
    tokio::fs::create_dir_all(&blob_dir).await?;
    tracing::info!(path = %blob_dir.display(), "Blob store ready");

    // Initial receiver dropped - subscribers use event_tx.subscribe()
    let (event_tx, _initial_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let call_timeout = sync_call_timeout();
    let threads = Arc::new(
        ThreadSynchronizer::new(Arc::clone(&storage) as Arc<dyn ThreadStore>, call_timeout)
            .with_events(event_tx.clone()),
    );
    match thread_idle_timeout() {
        Some(idle) => start_thread_eviction(Arc::clone(&threads), idle),
        None => tracing::info!("Thread mirror eviction disabled"),
    }
    let analysis_service = Arc::new(
        AnalysisService::new(Arc::clone(&storage), llm, Arc::clone(&threads))
            .with_events(event_tx.clone()),
    );
    let upload_service = Arc::new(
        UploadService::new(
            Arc::clone(&storage) as Arc<dyn UploadStore>,
            Arc::new(LocalBlobStore::new(blob_dir)),
        )
        .with_events(event_tx.clone()),
    );

    let state = Arc::new(AppState {
        event_tx,
        analysis_service,
        threads,
        upload_service,
        storage_kind: storage.kind(),
    });

    let router = create_router(state);
    let addr = format!("{host}:{port}");
    tracing::info!(storage = storage.kind(), ?call_timeout, "Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
