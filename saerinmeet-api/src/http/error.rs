// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert saerinmeet_core errors to HTTP errors
impl From<saerinmeet_core::Error> for AppError {
    fn from(err: saerinmeet_core::Error) -> Self {
        use saerinmeet_core::Error;

        match err {
            Error::NotFound(msg) => Self::not_found(msg),
            Error::Conflict(msg) => Self::conflict(msg),
            Error::Authentication(msg) => Self::unauthorized(msg),
            Error::Authorization(msg) => Self::forbidden(msg),
            Error::InvalidInput(msg) => Self::bad_request(msg),
            Error::Egress(e) => {
                tracing::warn!("Egress error: {}", e);
                Self::bad_gateway(format!("Failed to start recording: {e}"))
            }
            Error::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                Self::internal_server_error("Storage error")
            }
            Error::Database(e) => {
                tracing::error!("Database error: {}", e);
                Self::internal_server_error("Database error")
            }
            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                Self::internal_server_error("Data processing error")
            }
            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                Self::internal_server_error("Internal server error")
            }
        }
    }
}

/// Convert serde_json errors to HTTP errors
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON error: {err}"))
    }
}

/// Convert anyhow errors to HTTP errors
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {}", err);
        Self::internal_server_error("Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saerinmeet_core::egress::EgressError;
    use saerinmeet_core::Error;

    #[test]
    fn test_core_error_status_mapping() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("x".into()), StatusCode::CONFLICT),
            (Error::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (Error::Authorization("x".into()), StatusCode::FORBIDDEN),
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                Error::Egress(EgressError::Transport("refused".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (Error::Internal("secret detail".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_details_are_not_echoed() {
        let err = AppError::from(Error::Internal("db password is hunter2".into()));
        assert_eq!(err.message, "Internal server error");
    }
}
