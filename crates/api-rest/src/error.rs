use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vault_core::VaultError;

/// An HTTP status plus a plain-text message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        let status = match &err {
            VaultError::NotFound(_) => StatusCode::NOT_FOUND,
            VaultError::InvalidMimeType(_) | VaultError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VaultError::StorageService(_) => StatusCode::EXPECTATION_FAILED,
            VaultError::IndexRead(_) | VaultError::IndexWrite(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() || self.status == StatusCode::EXPECTATION_FAILED {
            tracing::error!("API error: {} - {}", self.status, self.message);
        } else {
            tracing::debug!("API error: {} - {}", self.status, self.message);
        }
        (self.status, self.message).into_response()
    }
}
