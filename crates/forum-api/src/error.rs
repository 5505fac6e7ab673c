use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use forum_db::DbError;
use forum_types::api::ErrorResponse;

use crate::oauth::ProviderError;

/// Request-scoped failures of the auth and reaction core.
///
/// Each variant maps to one status code. Internal and provider details are
/// logged here and never reach the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Wrong email or password. Deliberately does not say which.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthorized,

    #[error("you do not have permission to modify this resource")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("identity provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("invalid or expired OAuth state")]
    StateInvalid,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) | ApiError::StateInvalid => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to show to the client.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Provider(_) => "Login with the identity provider failed".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => ApiError::NotFound("resource"),
            DbError::Expired => ApiError::Unauthorized,
            DbError::DuplicateUsername => ApiError::Conflict("username already taken"),
            DbError::DuplicateEmail => ApiError::Conflict("email already taken"),
            DbError::EmailConflict => {
                ApiError::Conflict("email already registered with a password account, please use regular login")
            }
            DbError::NotOwner => ApiError::Forbidden,
            e @ (DbError::Sqlite(_) | DbError::LockPoisoned | DbError::Corrupt(_)) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", err);
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(detail) => error!("Internal error: {}", detail),
            ApiError::Provider(detail) => warn!("OAuth provider failure: {}", detail),
            _ => {}
        }

        let body = ErrorResponse {
            error: self.client_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
