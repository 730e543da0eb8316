//! Error handling for route handlers
//!
//! Every handler returns `Result<_, ApiError>`. Known kinds map to their status
//! code with the error envelope; internal errors are logged under a generated
//! trace id which is echoed back to the client as `errorId`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use super::envelope;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credential
    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated, but acting on someone else's resource
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests, please try again later.")]
    TooManyRequests,

    #[error("{context}: {message}")]
    Internal { context: String, message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            context: context.to_string(),
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Internal { context, message } => {
                let error_id = Uuid::new_v4().to_string();
                tracing::error!(error_id = %error_id, "{}: {}", context, message);
                (
                    status,
                    envelope::error("Internal Server Error", Some(error_id)),
                )
                    .into_response()
            }
            other => (status, envelope::error(other.to_string(), None)).into_response(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(resource) => Self::NotFound(format!("{} not found.", resource)),
            StoreError::Conflict(field) => Self::Conflict(format!("{} already exists.", field)),
            StoreError::Database(e) => Self::internal("Database error", e),
        }
    }
}

/// Extension trait for turning foreign errors into `ApiError`s with context
pub trait LogErr<T> {
    /// Convert to an internal error (500) carrying `context`
    fn log_500(self, context: &str) -> Result<T, ApiError>;

    /// Log at debug level and return the given client-facing error
    fn log_status(self, context: &str, err: ApiError) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal(context, e))
    }

    fn log_status(self, context: &str, err: ApiError) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::debug!("{}: {}", context, e);
            err
        })
    }
}
