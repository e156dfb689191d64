use axum::{Json,
    http::StatusCode,
    response::IntoResponse
};
use serde_json::json;
use thiserror::Error;

use crate::{records::RecordError, storage::StorageError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Multipart error: {0}")]
    MultipartError(String),

    #[error("Upload failed: {0}")]
    UploadFailed(#[from] StorageError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Convert `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::MultipartError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::UploadFailed(err) => {
                tracing::error!("Blob upload failed: {}", err);
                (StatusCode::BAD_GATEWAY, "Failed to upload file".to_string())
            }
            AppError::Record(err) => match err {
                RecordError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("Not found: {}", msg)),
                RecordError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
                RecordError::Conflict(msg) => (StatusCode::CONFLICT, format!("Duplicate record: {}", msg)),
                RecordError::RemoteUnavailable(msg) => {
                    tracing::error!("Record store unavailable: {}", msg);
                    (StatusCode::SERVICE_UNAVAILABLE, "Record store unavailable".to_string())
                }
                other => {
                    tracing::error!("Record Error: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Record store error".to_string())
                }
            },
        };

        // Return standardized JSON error response
        let body = Json(json!({"error": error_message}));
        (status, body).into_response()
    }
}
