use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::ai::AnalysisError;
use crate::models::FieldError;
use crate::storage::StorageError;

/// Everything a handler can surface. Responses are always a small JSON
/// object with a human-readable `message` (plus `errors` for validation).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid search data")]
    Validation(Vec<FieldError>),
    #[error("Invalid property ID")]
    InvalidId,
    #[error("Property not found")]
    NotFound,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("Failed to analyze property with AI. Please try again.")]
    Analysis(#[from] AnalysisError),
    #[error("Internal server error")]
    Storage(#[from] StorageError),
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidId => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Analysis(_) | ApiError::Storage(_) | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            log::error!("Request failed: {:?}", self);
        }

        let body = match &self {
            ApiError::Validation(errors) => json!({
                "message": self.to_string(),
                "errors": errors,
            }),
            _ => json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
