use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    models::{MessageResponse, ValidationError},
    storage::MediaError,
};

/// AppError
///
/// Every failure a request can end in. Converted to a `{ "message": ... }`
/// body at the API boundary, so no error ever escapes a handler as a panic.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, oversized or out-of-domain field, or a malformed request body.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing or invalid credential.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller is authenticated but does not own the record.
    #[error("Not authorized")]
    Forbidden,

    #[error("News not found")]
    NotFound,

    /// The media sink refused the upload.
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for service and handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::Validation(ValidationError(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Media(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                "An internal error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(MessageResponse::new(message))).into_response()
    }
}

// --- Extractor rejections ---
// Axum's default rejections answer in plain text; these keep the JSON shape.

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::bad_request(err.body_text())
    }
}

/// An id that does not parse cannot name a stored record.
impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::NotFound
    }
}
