//! # Device Waiting Room
//!
//! Entry point of the waiting room service. Devices discovered by connectors
//! wait here, scoped to their owner, until the owner adopts ("uses"),
//! deletes, or hides them. Owners follow changes live over `/events`.
//!
//! Started with `--migrate <backend>` the binary instead copies every record
//! from the configured backend into the named one and exits.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use waitroom_core::auth::{Clock, JwtValidator, SystemClock};
use waitroom_core::controller::{Controller, ControllerConfig};
use waitroom_core::devicemanager::HttpDeviceManager;
use waitroom_core::persistence::{self, DeviceStore};
use waitroom_core::realtime::{SessionConfig, SubscriptionRegistry};

use waitroom_server::app::{self, AppState};
use waitroom_server::config::load_config;
use waitroom_server::{logger, migrate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Phase 1: Configuration Loading ---
    let config = load_config()?;

    // --- Phase 2: Logging Setup ---
    let _log_guard = logger::setup_logging(
        config.log_level.as_deref().unwrap_or("info"),
        config.log_dir.as_deref(),
        config.log_json.unwrap_or(false),
    )?;
    let settings = config.into_settings()?;

    // --- Phase 3: Migration Command ---
    if let Some(target) = settings.migrate {
        migrate::run_migration(&settings, target).await?;
        return Ok(());
    }

    // --- Phase 4: Storage ---
    let store = persistence::connect(settings.backend, &settings.store)
        .await
        .with_context(|| format!("Failed to connect storage backend '{}'", settings.backend))?;
    info!(backend = store.name(), "Storage ready");

    // --- Phase 5: Core Services ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let device_manager = Arc::new(HttpDeviceManager::new(settings.device_manager_url.clone())?);
    let controller = Arc::new(Controller::new(
        Arc::clone(&store),
        device_manager,
        Arc::new(SubscriptionRegistry::new()),
        Arc::clone(&clock),
        ControllerConfig { delete_after_use_wait: settings.delete_after_use_wait },
    ));
    let ws_validator = Arc::new(JwtValidator::from_config(settings.jwt_pub_rsa_key.as_deref())?);
    if settings.jwt_pub_rsa_key.is_none() {
        warn!("No JWT public key configured; websocket tokens are not signature-checked");
    }

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(
        controller,
        Arc::new(JwtValidator::unverified()),
        ws_validator,
        clock,
        SessionConfig { ping_period: settings.ws_ping_period, debug: settings.debug },
        shutdown.clone(),
    ));

    // --- Phase 6: Server Binding and Signal Handling ---
    let handle = axum_server::Handle::new();
    let signal_handle = handle.clone();
    let grace = settings.shutdown_grace;
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown signal received. Closing server gracefully...");
        shutdown.cancel();
        signal_handle.graceful_shutdown(Some(grace));
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.api_port));
    let served = app::serve(addr, state, handle).await;

    // --- Phase 7: Teardown ---
    store.close().await;
    match &served {
        Ok(()) => info!("Shutdown complete"),
        Err(e) => error!("Server stopped with error: {}", e),
    }
    served.context("API server failed")
}

/// Resolves on `CTRL+C` or, on unix, `SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
