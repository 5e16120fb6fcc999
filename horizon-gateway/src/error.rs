//! Gateway errors and their HTTP rendering

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use horizon_rbac::{ErrorKind, PortalError};
use serde::Serialize;
use thiserror::Error;

/// Startup and configuration failures of the gateway binary
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Portal(#[from] PortalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire shape of every error reply
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// A portal error on its way to the client
#[derive(Debug)]
pub struct ApiError(pub PortalError);

impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        Self(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        // Store-level details stay in the log
        let message = match &self.0 {
            PortalError::Unauthenticated(m)
            | PortalError::PermissionDenied(m)
            | PortalError::InvalidArgument(m)
            | PortalError::AlreadyExists(m)
            | PortalError::Internal(m) => m.clone(),
            other => {
                tracing::error!(error = %other, "Unmapped error reached the gateway");
                "An unexpected error occurred.".to_string()
            }
        };
        let body = ErrorBody {
            code: kind.code(),
            message,
        };
        (status_for(kind), Json(body)).into_response()
    }
}
