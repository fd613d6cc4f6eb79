//! `/devices`: listing, reading, create-or-replace and deletion.

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use std::sync::Arc;

use waitroom_core::model::{Device, DeviceList, ListOptions};

use super::{ApiError, AuthUser};
use crate::app::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/devices", get(list_devices).put(set_devices).delete(delete_devices))
        .route(
            "/devices/{local_id}",
            get(read_device).head(device_exists).put(set_device).delete(delete_device),
        )
}

/// `GET /devices?limit=&offset=&sort=&search=&show_hidden=`
async fn list_devices(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    Query(options): Query<ListOptions>,
) -> Result<Json<DeviceList>, ApiError> {
    Ok(Json(state.controller.list_devices(&token, options).await?))
}

async fn read_device(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    Ok(Json(state.controller.read_device(&token, &local_id).await?))
}

/// Status only: 200 when the caller owns the record.
async fn device_exists(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<String>,
) -> StatusCode {
    match state.controller.read_device(&token, &local_id).await {
        Ok(_) => StatusCode::OK,
        Err(e) => ApiError::from(e).status(),
    }
}

async fn set_device(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<String>,
    body: Result<Json<Device>, JsonRejection>,
) -> Result<Json<Device>, ApiError> {
    let Json(device) = body?;
    if device.local_id != local_id {
        return Err(ApiError::BadRequest("expect path local_id == body.local_id".into()));
    }
    Ok(Json(state.controller.set_device(&token, device).await?))
}

/// Batch create-or-replace. Applied in order; the first failure aborts the rest.
async fn set_devices(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<Device>>, JsonRejection>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let Json(devices) = body?;
    Ok(Json(state.controller.set_multiple_devices(&token, devices).await?))
}

async fn delete_device(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.delete_device(&token, &local_id).await?;
    Ok(StatusCode::OK)
}

async fn delete_devices(
    AuthUser(token): AuthUser,
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(local_ids) = body?;
    state.controller.delete_multiple_devices(&token, &local_ids).await?;
    Ok(StatusCode::OK)
}
