use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use std::sync::Arc;

use analysis_console_core::UploadRecord;
use analysis_console_service::NewUpload;

use crate::AppState;
use crate::api_error::ApiError;
use crate::query_types::{LimitQuery, UploadQuery};

pub async fn create_upload(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadRecord>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let upload = NewUpload {
        client_id,
        period_id: query.period_id,
        file_name: query.file_name,
        content_type,
        bytes: body.to_vec(),
    };
    Ok(Json(state.upload_service.upload(upload).await?))
}

pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<UploadRecord>>, ApiError> {
    Ok(Json(state.upload_service.list(&client_id, query.capped_limit()).await?))
}

pub async fn download_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (record, bytes) = state.upload_service.download(&id).await?;
    let content_type =
        record.content_type.unwrap_or_else(|| "application/octet-stream".to_owned());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UploadRecord>, ApiError> {
    Ok(Json(state.upload_service.delete(&id).await?))
}
