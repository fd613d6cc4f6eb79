//! # Application State and Server Loop
//!
//! [`AppState`] bundles what the HTTP handlers and websocket sessions share.
//! [`serve`] binds the router and runs until the [`axum_server::Handle`]
//! is told to shut down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::info;

use waitroom_core::auth::{Clock, TokenValidator};
use waitroom_core::controller::Controller;
use waitroom_core::realtime::SessionConfig;

use crate::api;

/// # Application State
///
/// Shared by every route through an `Arc`.
pub struct AppState {
    pub controller: Arc<Controller>,
    /// Authenticates `Authorization` headers on HTTP routes.
    pub http_validator: Arc<dyn TokenValidator>,
    /// Authenticates `auth` frames on websocket sessions.
    pub ws_validator: Arc<dyn TokenValidator>,
    pub clock: Arc<dyn Clock>,
    pub session: SessionConfig,
    /// Cancelled on shutdown; live sessions close when it fires.
    pub shutdown: CancellationToken,
    connections: AtomicU64,
}

impl AppState {
    pub fn new(
        controller: Arc<Controller>,
        http_validator: Arc<dyn TokenValidator>,
        ws_validator: Arc<dyn TokenValidator>,
        clock: Arc<dyn Clock>,
        session: SessionConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            controller,
            http_validator,
            ws_validator,
            clock,
            session,
            shutdown,
            connections: AtomicU64::new(0),
        }
    }

    /// Unique id for a new websocket connection from `addr`.
    pub fn next_connection_id(&self, addr: SocketAddr) -> String {
        let n = self.connections.fetch_add(1, Ordering::Relaxed);
        format!("ws-{}-{}", addr, n)
    }
}

/// Serves the API on `addr` until `handle` shuts the server down.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>, handle: axum_server::Handle) -> std::io::Result<()> {
    let app = api::router(state);
    info!("Device waiting room listening on http://{}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
}
