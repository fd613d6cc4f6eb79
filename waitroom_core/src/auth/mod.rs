//! # Authentication
//!
//! Bearer tokens identify the owner of every request. A [`TokenValidator`]
//! turns a raw credential into an [`AuthToken`]; expiry is checked separately
//! against a [`Clock`] so sessions can notice a token running out while the
//! connection stays open.

pub mod clock;
pub mod jwt;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use jwt::JwtValidator;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing auth token")]
    Missing,
    #[error("invalid auth token: {0}")]
    Invalid(String),
    #[error("expired auth token")]
    Expired,
    #[error("invalid public key: {0}")]
    InvalidKey(String),
}

/// A validated credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    /// The credential as it is forwarded to other services (`Bearer <jwt>`).
    pub token: String,
    /// Subject of the token; the owner every record is scoped to.
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Parses raw credentials (with or without a `Bearer ` prefix).
///
/// Implementations do not enforce expiry; callers compare
/// [`AuthToken::expires_at`] against their own clock.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, credential: &str) -> Result<AuthToken, AuthError>;
}
