//! Error handling for the bookshelf HTTP layer

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Message returned for every 404.
pub const NOT_FOUND_MESSAGE: &str = "Not found";
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application error types that map to HTTP responses
///
/// Bodies are flat `{"error": "..."}` objects. Internal errors are logged
/// with an `error_id` and never echoed to the client.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            message: message.into(),
        }
    }

    /// Create a not found error carrying the standard message
    pub fn not_found() -> Self {
        Self::NotFound {
            message: NOT_FOUND_MESSAGE.to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

// Non-numeric ids never name a record.
impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::not_found()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let status = self.status();

        let body = match self {
            AppError::Validation { details, message } => {
                tracing::debug!(error_id = %error_id, %message, "validation failed");
                if details.is_empty() {
                    json!({ "error": message })
                } else {
                    json!({ "error": message, "details": details })
                }
            }
            AppError::BadRequest { message } => {
                tracing::debug!(error_id = %error_id, %message, "bad request");
                json!({ "error": message })
            }
            AppError::NotFound { message } => {
                tracing::debug!(error_id = %error_id, "resource not found");
                json!({ "error": message })
            }
            AppError::Internal(e) => {
                tracing::error!(
                    error_id = %error_id,
                    status_code = %status.as_u16(),
                    error = %format!("{e:#}"),
                    "request failed"
                );
                json!({ "error": INTERNAL_MESSAGE })
            }
        };

        (status, Json(body)).into_response()
    }
}
