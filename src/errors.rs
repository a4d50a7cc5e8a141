use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::storage::StorageError;

/// Service-wide error types that serialize cleanly to JSON for API consumers.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    #[error("No files found for user {user_id} in bucket {bucket}")]
    NotFound { user_id: String, bucket: String },

    #[error("Latest file metadata missing name")]
    MissingFileName,

    #[error("Failed to download file: {0}")]
    Download(String),

    #[error("Failed to open image: {0}")]
    Decode(String),

    #[error("Storage listing failed: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Detection model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Decode(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Download(_) | AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::MissingFileName
            | AppError::ModelUnavailable(_)
            | AppError::Inference(_)
            | AppError::Config(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::Inference(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::info!("Request rejected: {}", self);
        }
        let detail = self.to_string();
        (status, Json(json!({ "detail": detail, "error": self }))).into_response()
    }
}

/// Result type for service operations
pub type AppResult<T> = Result<T, AppError>;
