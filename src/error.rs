// Handler-level error type and its conversion into HTTP responses.
// Domain modules define their own thiserror enums; handlers fold them into AppError.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{backend::BackendError, criteria::CriteriaError};

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    BadRequest(String),
    NotFound(String),
    Backend(BackendError),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<CriteriaError> for AppError {
    fn from(error: CriteriaError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

impl From<BackendError> for AppError {
    fn from(error: BackendError) -> Self {
        AppError::Backend(error)
    }
}

impl From<askama::Error> for AppError {
    fn from(error: askama::Error) -> Self {
        tracing::error!("Failed to render template: {}", error);
        AppError::InternalServerError(anyhow::Error::new(error))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::BadRequest(message) => {
                tracing::warn!(%message, "Rejected request");
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Backend(e) => {
                tracing::error!(error = %e, "Backend call failed");
                (StatusCode::BAD_GATEWAY, "The booking service is unavailable, please try again.".to_string())
            }
        };

        (status, error_message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
