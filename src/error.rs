//! Error taxonomy for the control/orchestration/persistence core.
//!
//! Every parse/load/apply/lifecycle failure is recovered locally and
//! surfaced as one of these kinds; nothing here is allowed to poison an
//! `Instance` or abort a batch (see `batch::BatchDispatcher::execute`).

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("not batchable: {0}")]
    NotBatchable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Category string returned in the `error` field of the JSON error body.
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "NotFound",
            CoreError::InvalidArgument(_) => "InvalidArgument",
            CoreError::InvalidState(_) => "InvalidState",
            CoreError::InvalidFormat(_) => "InvalidFormat",
            CoreError::NotBatchable(_) => "NotBatchable",
            CoreError::Io(_) => "IoError",
            CoreError::Unavailable(_) => "Unavailable",
            CoreError::Internal(_) => "Internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CoreError::InvalidState(_) => StatusCode::BAD_REQUEST,
            CoreError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            CoreError::NotBatchable(_) => StatusCode::BAD_REQUEST,
            CoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The stable JSON error shape every handler returns: `error` + `message`,
/// with an optional `state` field lifecycle endpoints attach.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl From<&CoreError> for ErrorBody {
    fn from(e: &CoreError) -> Self {
        ErrorBody {
            error: e.category().to_string(),
            message: e.to_string(),
            state: None,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody::from(&self);
        (status, Json(body)).into_response()
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
