use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use analysis_console_service::{FollowUpOutcome, ReconcileReport, ThreadView};

use crate::AppState;
use crate::api_error::ApiError;
use crate::query_types::{AppendMessageRequest, AskRequest, ShareRequest};
use crate::response_types::{AppendMessageResponse, ClearResponse, DetachResponse, ShareResponse};

/// Reject thread operations on analyses that do not exist.
async fn require_analysis(state: &AppState, id: &str) -> Result<(), ApiError> {
    state.analysis_service.get_analysis(id).await?;
    Ok(())
}

/// Reload from the store. A failed fetch still answers 200 with
/// `load_error` set.
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ThreadView>, ApiError> {
    require_analysis(&state, &id).await?;
    Ok(Json(state.threads.load_thread(&id).await))
}

pub async fn append_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AppendMessageRequest>,
) -> Result<Json<AppendMessageResponse>, ApiError> {
    require_analysis(&state, &id).await?;
    state.threads.ensure_loaded(&id).await;
    let index = state.threads.append_local(&id, req.role, &req.content)?;
    let sync_error = state.threads.reconcile(&id).await.err().map(|e| {
        tracing::warn!(analysis_id = %id, error = %e, "appended message not persisted yet");
        e.to_string()
    });
    Ok(Json(AppendMessageResponse { index, thread: state.threads.view(&id), sync_error }))
}

pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReconcileReport>, ApiError> {
    require_analysis(&state, &id).await?;
    Ok(Json(state.threads.reconcile(&id).await?))
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<FollowUpOutcome>, ApiError> {
    Ok(Json(state.analysis_service.ask_follow_up(&id, &req.instruction, req.source_data).await?))
}

pub async fn set_shared(
    State(state): State<Arc<AppState>>,
    Path((id, ordinal)): Path<(String, usize)>,
    Json(req): Json<ShareRequest>,
) -> Result<Json<ShareResponse>, ApiError> {
    require_analysis(&state, &id).await?;
    state.threads.ensure_loaded(&id).await;
    let report = state.threads.set_shared(&id, ordinal, req.shared).await?;
    Ok(Json(ShareResponse { report, thread: state.threads.view(&id) }))
}

pub async fn clear_thread(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    require_analysis(&state, &id).await?;
    let removed = state.threads.clear_thread(&id).await?;
    Ok(Json(ClearResponse { removed }))
}

pub async fn detach(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<DetachResponse> {
    Json(DetachResponse { detached: state.threads.detach(&id) })
}
