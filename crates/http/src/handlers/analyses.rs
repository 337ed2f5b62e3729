use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use analysis_console_core::{AnalysisRequest, AnalysisResult};
use analysis_console_service::SharedAnalysis;

use crate::AppState;
use crate::api_error::ApiError;
use crate::query_types::{LimitQuery, VisibilityRequest};

pub async fn create_analysis(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    Ok(Json(state.analysis_service.generate_analysis(&client_id, request).await?))
}

pub async fn list_analyses(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AnalysisResult>>, ApiError> {
    Ok(Json(state.analysis_service.list_analyses(&client_id, query.capped_limit()).await?))
}

pub async fn client_view(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<SharedAnalysis>>, ApiError> {
    Ok(Json(state.analysis_service.client_view(&client_id, query.capped_limit()).await?))
}

pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisResult>, ApiError> {
    Ok(Json(state.analysis_service.get_analysis(&id).await?))
}

pub async fn set_visibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<VisibilityRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    Ok(Json(state.analysis_service.set_visibility(&id, req.shared).await?))
}
