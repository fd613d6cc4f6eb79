//! # Error Taxonomy
//!
//! Every fallible operation in the crate reports a [`RegistryError`]. The HTTP
//! layer maps the variants onto status codes via [`RegistryError::status_code`];
//! storage drivers convert their own errors into [`RegistryError::Internal`].

use thiserror::Error;

/// Failure kinds shared by storage, controller and device manager calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The addressed record does not exist (or is not visible to the caller).
    #[error("not found: {0}")]
    NotFound(String),
    /// The record exists but belongs to another owner.
    #[error("access denied: {0}")]
    Forbidden(String),
    /// Malformed input: bad sort field, negative pagination, mismatched ids.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Storage or transport failure.
    #[error("internal error: {0}")]
    Internal(String),
    /// The device manager answered with a non-success status.
    #[error("device manager responded with status {status}: {message}")]
    Upstream { status: u16, message: String },
}

/// Shorthand used throughout the crate.
pub type RegistryResult<T> = Result<T, RegistryError>;

impl RegistryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn internal(what: impl std::fmt::Display) -> Self {
        Self::Internal(what.to_string())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    /// HTTP status code this error is reported with.
    ///
    /// Upstream errors carry the device manager's status unchanged.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::InvalidArgument(_) => 400,
            Self::Internal(_) => 500,
            Self::Upstream { status, .. } => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_variant() {
        assert_eq!(RegistryError::not_found("x").status_code(), 404);
        assert_eq!(RegistryError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(RegistryError::invalid("x").status_code(), 400);
        assert_eq!(RegistryError::internal("boom").status_code(), 500);
    }

    #[test]
    fn upstream_passes_status_through() {
        let teapot = RegistryError::Upstream { status: 418, message: "short and stout".into() };
        assert_eq!(teapot.status_code(), 418);

        let redirect = RegistryError::Upstream { status: 302, message: String::new() };
        assert_eq!(redirect.status_code(), 302);
    }
}
