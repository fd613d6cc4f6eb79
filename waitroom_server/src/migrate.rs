//! `--migrate <backend>`: copies every record from the configured backend
//! into another one, then exits without starting the API.

use anyhow::{Context, Result, bail};
use tracing::{error, info};

use waitroom_core::persistence::{self, BackendKind, DeviceStore};

use crate::config::Settings;

/// Connects both backends and copies the configured one into `target`.
pub async fn run_migration(settings: &Settings, target: BackendKind) -> Result<u64> {
    let source = settings.backend;
    if source == target {
        bail!("Migration source and target are both '{}'", source);
    }
    info!(%source, %target, "Starting migration");

    let from = persistence::connect(source, &settings.store)
        .await
        .with_context(|| format!("Failed to connect migration source '{}'", source))?;
    let to = match persistence::connect(target, &settings.store).await {
        Ok(store) => store,
        Err(e) => {
            from.close().await;
            return Err(e).with_context(|| format!("Failed to connect migration target '{}'", target));
        }
    };

    let copied = copy_all(from.as_ref(), to.as_ref()).await;
    from.close().await;
    to.close().await;
    copied
}

/// Runs the migration engine between two connected stores.
pub async fn copy_all(from: &dyn DeviceStore, to: &dyn DeviceStore) -> Result<u64> {
    match from.migrate_to(to).await {
        Ok(copied) => {
            info!(source = from.name(), target = to.name(), copied, "Migration finished");
            Ok(copied)
        }
        Err(e) => {
            error!(source = from.name(), target = to.name(), "Migration failed: {}", e);
            Err(e.into())
        }
    }
}
