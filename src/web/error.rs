use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::lifecycle::StateConflictError;
use crate::scope::ScopeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("State conflict: {0}")]
    StateConflict(#[from] StateConflictError),
    #[error("Monitoring backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::StateConflict(err) => (StatusCode::CONFLICT, err.to_string()),
            AppError::Backend(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {msg}"),
            ),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<ScopeError> for AppError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::UnknownKind(_) | ScopeError::NotFound { .. } => {
                AppError::InvalidInput(err.to_string())
            }
            ScopeError::LookupFailed(msg) => AppError::InternalServerError(msg),
        }
    }
}
