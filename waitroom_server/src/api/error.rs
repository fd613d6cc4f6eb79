use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use waitroom_core::RegistryError;
use waitroom_core::auth::AuthError;

/// Error returned by every handler. Rendered as a plain-text body with the
/// status of the underlying failure.
#[derive(Debug)]
pub enum ApiError {
    /// Controller or storage failure.
    Registry(RegistryError),
    /// Missing or unreadable credentials.
    Unauthorized(AuthError),
    /// Malformed request that never reached the controller.
    BadRequest(String),
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::Registry(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Registry(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Registry(e) => e.to_string(),
            ApiError::Unauthorized(e) => e.to_string(),
            ApiError::BadRequest(message) => message,
        };
        if status.is_server_error() {
            error!(%status, "Request failed: {}", message);
        } else {
            debug!(%status, "Request rejected: {}", message);
        }
        (status, message).into_response()
    }
}
