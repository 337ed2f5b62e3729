//! HTTP API server for the analysis console.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(unreachable_pub, reason = "pub items are re-exported")]
#![allow(clippy::absolute_paths, reason = "Explicit paths for clarity")]
#![allow(unused_results, reason = "Some results are intentionally ignored")]
#![allow(missing_copy_implementations, reason = "Types may grow")]
#![allow(missing_debug_implementations, reason = "Internal types")]
#![allow(clippy::missing_docs_in_private_items, reason = "Internal crate")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::min_ident_chars, reason = "Short closure params are idiomatic")]
#![allow(clippy::exhaustive_structs, reason = "HTTP types are stable")]
#![allow(clippy::single_call_fn, reason = "Helper functions improve readability")]

pub mod api_error;
mod handlers;
mod query_types;
mod response_types;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post, put},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use analysis_console_core::MAX_UPLOAD_BYTES;
use analysis_console_service::{AnalysisService, ThreadSynchronizer, UploadService};

pub use response_types::VersionResponse;

/// Shared application state for all HTTP handlers.
///
/// Wrapped in `Arc` for sharing across handlers.
pub struct AppState {
    /// Broadcast channel for SSE change notifications
    pub event_tx: broadcast::Sender<String>,
    /// Analyses, generation and the client view
    pub analysis_service: Arc<AnalysisService>,
    /// Follow-up thread mirrors
    pub threads: Arc<ThreadSynchronizer>,
    /// Upload blobs and metadata
    pub upload_service: Arc<UploadService>,
    /// Storage backend name reported by `/api/version`
    pub storage_kind: &'static str,
}

/// Spawns the task that drops thread mirrors idle for longer than `idle`.
///
/// Only fully synced mirrors with no call in flight are dropped; they reload
/// from the store on next use.
pub fn start_thread_eviction(threads: Arc<ThreadSynchronizer>, idle: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(idle.min(Duration::from_secs(60)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = threads.evict_idle(idle);
            if evicted > 0 {
                tracing::info!(evicted, open = threads.open_threads(), "Thread mirrors evicted");
            }
        }
    });
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/version", get(version))
        .route("/events", get(handlers::events::sse_events))
        .route(
            "/api/clients/{client_id}/analyses",
            get(handlers::analyses::list_analyses).post(handlers::analyses::create_analysis),
        )
        .route("/api/clients/{client_id}/shared", get(handlers::analyses::client_view))
        .route("/api/analyses/{id}", get(handlers::analyses::get_analysis))
        .route("/api/analyses/{id}/visibility", put(handlers::analyses::set_visibility))
        .route(
            "/api/analyses/{id}/thread",
            get(handlers::threads::get_thread).delete(handlers::threads::clear_thread),
        )
        .route("/api/analyses/{id}/thread/messages", post(handlers::threads::append_message))
        .route("/api/analyses/{id}/thread/reconcile", post(handlers::threads::reconcile))
        .route("/api/analyses/{id}/thread/ask", post(handlers::threads::ask))
        .route("/api/analyses/{id}/thread/shared/{ordinal}", put(handlers::threads::set_shared))
        .route("/api/analyses/{id}/thread/detach", post(handlers::threads::detach))
        .route(
            "/api/clients/{client_id}/uploads",
            get(handlers::uploads::list_uploads)
                .post(handlers::uploads::create_upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/uploads/{id}",
            get(handlers::uploads::download_upload).delete(handlers::uploads::delete_upload),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn version(State(state): State<Arc<AppState>>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage_kind,
        generation_configured: state.analysis_service.generation_configured(),
    })
}

#[cfg(test)]
mod tests;
