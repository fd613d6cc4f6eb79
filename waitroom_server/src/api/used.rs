//! `/used/devices`: hands waiting devices over to the device manager.

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use std::sync::Arc;

use super::{ApiError, AuthUser};
use crate::app::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/used/devices", post(use_devices))
        .route("/used/devices/{local_id}", post(use_device))
}

async fn use_device(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.use_device(&token, &local_id).await?;
    Ok(StatusCode::OK)
}

async fn use_devices(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(local_ids) = body?;
    state.controller.use_multiple_devices(&token, &local_ids).await?;
    Ok(StatusCode::OK)
}
