//! API error handling.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use rfidreg_core::error::RegistryError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// Not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Validation error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "INVALID_INPUT")
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let code = err.code();
        match &err {
            RegistryError::InvalidInput(_) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string(), code)
            }
            RegistryError::ScanTimeout { .. } => {
                ApiError::new(StatusCode::REQUEST_TIMEOUT, err.to_string(), code)
            }
            RegistryError::AlreadyRegistered { .. }
            | RegistryError::DuplicateUid(_)
            | RegistryError::Cancelled => {
                ApiError::new(StatusCode::CONFLICT, err.to_string(), code)
            }
            RegistryError::ReaderBusy => {
                ApiError::new(StatusCode::LOCKED, err.to_string(), code)
            }
            RegistryError::ReaderUnavailable(_) => {
                tracing::warn!(error = %err, "Reader unavailable");
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string(), code)
            }
            _ => {
                tracing::error!(error = %err, "Internal error");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The tag store is unavailable",
                    code,
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, rejection.body_text(), "PAYLOAD_TOO_LARGE");
        }
        ApiError::invalid_input(rejection.body_text())
    }
}
