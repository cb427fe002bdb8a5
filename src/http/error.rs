//! Mapping from [`StudyError`] to HTTP responses.

use super::models::ErrorResponse;
use crate::error::StudyError;
use axum::{
    extract::rejection::JsonRejection,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

/// An error response: status plus `{error, kind, retryable}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                kind: kind.to_string(),
                retryable: false,
                draft: None,
            },
        }
    }
}

pub fn status_for(err: &StudyError) -> StatusCode {
    match err {
        StudyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        StudyError::NotFound { .. } => StatusCode::NOT_FOUND,
        StudyError::InputTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        StudyError::UnsupportedFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        StudyError::ModelUnavailable { .. } => StatusCode::BAD_GATEWAY,
        StudyError::PersistenceFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StudyError::ModelTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        StudyError::ProviderNotConfigured { .. }
        | StudyError::InvalidConfig(_)
        | StudyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!("{} → {}", err.kind(), err);
        }
        let body = ErrorResponse {
            error: err.to_string(),
            kind: err.kind().to_string(),
            retryable: err.is_retryable(),
            draft: None,
        };
        let draft = match err {
            StudyError::PersistenceFailure { draft, .. } => draft.map(|d| *d),
            _ => None,
        };
        Self {
            status,
            body: ErrorResponse { draft, ..body },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_input", rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), "invalid_input", err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
