//! Quiz Error Types
//!
//! Infrastructure and request errors that integrate with the unified
//! `kernel::error::AppError` system.
//!
//! Rejected submissions are not errors: they are `Admission` values and
//! never reach this type.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::rate_limit::RateLimitError;
use platform::token::TokenError;
use thiserror::Error;

/// Quiz-specific result type alias
pub type QuizResult<T> = Result<T, QuizError>;

#[derive(Debug, Error)]
pub enum QuizError {
    /// No session cookie on a request that needs one
    #[error("Session cookie missing")]
    SessionCookieMissing,

    /// Session cookie names an unknown, completed or expired session
    #[error("Invalid or expired session.")]
    SessionInvalid,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Rate limit store error: {0}")]
    RateLimitStore(#[from] RateLimitError),

    /// Token signing failed
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuizError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuizError::SessionCookieMissing => ErrorKind::Unauthorized,
            QuizError::SessionInvalid => ErrorKind::Forbidden,
            QuizError::Database(_)
            | QuizError::RateLimitStore(_)
            | QuizError::Token(_)
            | QuizError::Configuration(_)
            | QuizError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            QuizError::Database(e) => {
                tracing::error!(error = %e, "Quiz database error");
            }
            QuizError::RateLimitStore(e) => {
                tracing::error!(error = %e, "Quiz rate limit store error");
            }
            QuizError::Token(e) => {
                tracing::error!(error = %e, "Quiz token signing failed");
            }
            QuizError::Configuration(msg) | QuizError::Internal(msg) => {
                tracing::error!(message = %msg, "Quiz internal error");
            }
            QuizError::SessionCookieMissing | QuizError::SessionInvalid => {
                tracing::debug!(error = %self, "Quiz session check failed");
            }
        }
    }
}

impl From<QuizError> for AppError {
    fn from(err: QuizError) -> Self {
        let kind = err.kind();
        if kind.is_server_error() {
            // Internal details stay in the logs
            return AppError::new(kind, "Internal server error").with_source(err);
        }
        AppError::new(kind, err.to_string())
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
