//! Shared API response envelope and error type.
//!
//! Every endpoint answers with `{success, message, data}`. Success bodies
//! are built with [`envelope`]; failures go through [`ApiError`], which maps
//! onto the same shape with `success: false` and an empty `data` object, so
//! clients parse exactly one schema.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use switchboard_store::StoreError;
use switchboard_voice::VoiceError;
use thiserror::Error;

/// Builds a success envelope.
pub fn envelope<T: Serialize>(message: &str, data: T) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": message,
        "data": data,
    }))
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream platform failure: {0}")]
    UpstreamFailure(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::UpstreamFailure(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), message, "request failed");
        }

        let body = Json(json!({
            "success": false,
            "message": message,
            "data": {},
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ApiError::NotFound(format!("Record not found: {id}")),
            StoreError::Conflict(msg) => ApiError::BadRequest(msg),
            StoreError::ToolsMissing { ids } => {
                ApiError::NotFound(format!("Tools not found: {}", ids.join(", ")))
            }
            StoreError::Database(e) => ApiError::Internal(format!("database error: {e}")),
            StoreError::Json(e) => ApiError::Internal(format!("serialization error: {e}")),
        }
    }
}

impl From<VoiceError> for ApiError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::RoomService(msg) => {
                ApiError::UpstreamFailure(format!("voice platform error: {msg}"))
            }
            VoiceError::Platform(msg) => {
                ApiError::UpstreamFailure(format!("voice platform error: {msg}"))
            }
            VoiceError::LiveKit(e) => ApiError::Internal(format!("token error: {e}")),
            VoiceError::Config(msg) => ApiError::Internal(format!("voice config error: {msg}")),
        }
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(e: r2d2::Error) -> Self {
        ApiError::Internal(format!("db connection failed: {e}"))
    }
}

/// Runs store work on a blocking thread, flattening join errors.
pub async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("task join error: {e}")))?
}
