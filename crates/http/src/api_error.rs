//! Typed API error for HTTP handlers.
//!
//! Converts service errors into JSON responses with matching status codes.
//! Handlers return `Result<Json<T>, ApiError>`.

use analysis_console_service::ServiceError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API error with HTTP status code and human-readable message.
///
/// Converts to JSON response: `{"error": "message"}`.
///
/// `Internal` logs the real error server-side and returns a static message
/// to the client.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request: invalid input from caller.
    BadRequest(String),
    /// 404 Not Found: requested resource doesn't exist.
    NotFound(String),
    /// 409 Conflict: the thread changed or was detached mid-call. Retry.
    Conflict(String),
    /// 422 Unprocessable Entity: valid syntax but semantic rejection (duplicate).
    UnprocessableEntity(String),
    /// 500 Internal Server Error: unexpected failure. Details logged, not exposed.
    Internal(anyhow::Error),
    /// 502 Bad Gateway: the generation endpoint failed.
    BadGateway(String),
    /// 503 Service Unavailable: backend not configured or not answering. Retry.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Self::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            },
            Self::BadGateway(msg) => {
                tracing::warn!(error = %msg, "generation endpoint failed");
                (StatusCode::BAD_GATEWAY, "generation endpoint failed".to_owned())
            },
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        let body = serde_json::json!({"error": message});
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(ref e) if e.is_duplicate() => {
                Self::UnprocessableEntity(err.to_string())
            },
            ref e if e.is_not_found() => Self::NotFound(err.to_string()),
            ServiceError::InvalidInput(msg) => Self::BadRequest(msg),
            ServiceError::NotConfigured(msg) => Self::ServiceUnavailable(msg),
            ServiceError::Timeout { .. } => Self::ServiceUnavailable(err.to_string()),
            ServiceError::Cancelled(_) | ServiceError::Superseded(_) => {
                Self::Conflict(err.to_string())
            },
            ServiceError::Llm(e) => Self::BadGateway(e.to_string()),
            _ => Self::Internal(err.into()),
        }
    }
}
