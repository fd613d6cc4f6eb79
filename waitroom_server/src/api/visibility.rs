//! `/hidden/devices` and `/shown/devices`: toggling whether a record shows up
//! in default listings.

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use std::sync::Arc;

use super::{ApiError, AuthUser};
use crate::app::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/hidden/devices", put(hide_devices))
        .route("/hidden/devices/{local_id}", put(hide_device))
        .route("/shown/devices", put(show_devices))
        .route("/shown/devices/{local_id}", put(show_device))
}

async fn hide_device(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.hide_device(&token, &local_id).await?;
    Ok(StatusCode::OK)
}

async fn hide_devices(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(local_ids) = body?;
    state.controller.hide_multiple_devices(&token, &local_ids).await?;
    Ok(StatusCode::OK)
}

async fn show_device(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.show_device(&token, &local_id).await?;
    Ok(StatusCode::OK)
}

async fn show_devices(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(local_ids) = body?;
    state.controller.show_multiple_devices(&token, &local_ids).await?;
    Ok(StatusCode::OK)
}
