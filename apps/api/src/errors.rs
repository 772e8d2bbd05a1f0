use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::rendering::RenderError;
use crate::storage::StorageError;
use crate::structuring::StructuringError;

/// Application-level error type. Every pipeline stage maps its own failures
/// into exactly one of these kinds before returning to the orchestrator.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Extraction error: {0}")]
    Extraction(ExtractionError),

    #[error("Structuring error: {0}")]
    Structuring(#[from] StructuringError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A failed read-back of the stored document is a storage failure, not an
/// unreadable document.
impl From<ExtractionError> for AppError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::Fetch(storage) => AppError::Storage(storage),
            other => AppError::Extraction(other),
        }
    }
}

impl AppError {
    /// Stable machine-readable code for the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Extraction(_) => "EXTRACTION_ERROR",
            AppError::Structuring(_) => "STRUCTURING_ERROR",
            AppError::Render(_) => "RENDER_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Structuring(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_)
            | AppError::Extraction(_)
            | AppError::Render(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match &self {
            AppError::InvalidInput(msg) | AppError::UnsupportedMediaType(msg) => msg.clone(),
            AppError::Storage(StorageError::NotFound(path)) => {
                tracing::warn!("Artifact not found: {path}");
                "The requested artifact does not exist".to_string()
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                "A storage error occurred".to_string()
            }
            AppError::Extraction(e) => {
                tracing::error!("Extraction error: {e}");
                "No usable text could be extracted from the document".to_string()
            }
            AppError::Structuring(e) => {
                tracing::error!("Structuring error: {e}");
                "An AI processing error occurred".to_string()
            }
            AppError::Render(e) => {
                tracing::error!("Render error: {e}");
                "The profile site could not be rendered".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
