//! Error taxonomy for the relay core and the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failures produced by key issuance and session coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("key already in use")]
    KeyAlreadyExists,
    #[error("no unique key found")]
    ExhaustedKeySpace,
    #[error("transfer does not exist")]
    NoSuchTransfer,
    #[error("no receiver found")]
    TransferTimedOut,
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal error");
                return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
            }
        };
        (status, self.to_string()).into_response()
    }
}
