//! # HTTP API
//!
//! Routes are registered explicitly, in a fixed order, by [`router`]. Every
//! device route authenticates through the [`AuthUser`] extractor; the
//! websocket route authenticates inside the session instead.

pub mod devices;
pub mod error;
pub mod events;
pub mod used;
pub mod visibility;

use axum::Router;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::routing::get;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use waitroom_core::auth::{AuthError, AuthToken};

use crate::app::AppState;
pub use error::ApiError;

/// Handling budget of a single HTTP request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The caller, taken from the `Authorization` header.
///
/// Expiry is not checked here; the gateway in front of the API does that.
pub struct AuthUser(pub AuthToken);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| AuthError::Invalid("non-ascii authorization header".into())))
            .transpose()
            .map_err(ApiError::Unauthorized)?
            .ok_or(ApiError::Unauthorized(AuthError::Missing))?;
        let token = state.http_validator.validate(credential).map_err(ApiError::Unauthorized)?;
        Ok(AuthUser(token))
    }
}

async fn health() -> &'static str {
    "OK"
}

/// Builds the full router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .merge(devices::routes())
        .merge(visibility::routes())
        .merge(used::routes())
        .merge(events::routes())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .with_state(state)
}
