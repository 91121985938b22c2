//! Server-wide error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::ingest::IngestError;

/// Result type alias for API operations
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application error type mapped onto HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(ref message) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", message.clone())
            },
            AppError::Validation(ref message) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message.clone())
            },
            AppError::Ingest(ref e) => {
                // Structural errors are the caller's fault; commit errors
                // surface the offending step's storage error text.
                if e.is_structural() {
                    (StatusCode::BAD_REQUEST, "INGEST_REJECTED", e.to_string())
                } else {
                    tracing::error!("Ingestion run failed: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INGEST_FAILED",
                        e.to_string(),
                    )
                }
            },
            AppError::Io(ref e) => {
                tracing::error!("IO error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An IO error occurred".to_string(),
                )
            },
        };

        let body = ErrorResponse::new(code, message);
        (status, Json(body)).into_response()
    }
}
