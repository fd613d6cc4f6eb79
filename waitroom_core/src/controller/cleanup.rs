//! # Delayed Cleanup After Use
//!
//! After a device is adopted its record is deleted right away. A second,
//! delayed delete runs later to catch a record that reappeared or whose first
//! delete was lost. The delayed delete is fire-and-forget: once scheduled it
//! cannot be cancelled and its failure is only logged.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::RegistryResult;
use crate::persistence::DeviceStore;

/// Parses the configured wait. `""`, `"-"`, zero and unparseable values turn
/// the delayed delete off.
pub fn parse_wait_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        return None;
    }
    match humantime::parse_duration(raw) {
        Ok(wait) if wait.is_zero() => None,
        Ok(wait) => Some(wait),
        Err(e) => {
            warn!(value = raw, "Ignoring invalid delete-after-use wait duration: {}", e);
            None
        }
    }
}

/// Waits `delay`, then removes `local_id`.
pub async fn delayed_delete(store: &dyn DeviceStore, local_id: &str, delay: Duration) -> RegistryResult<()> {
    tokio::time::sleep(delay).await;
    store.remove_device(local_id).await
}

/// Spawns [`delayed_delete`] on its own task.
pub fn schedule_delayed_delete(store: Arc<dyn DeviceStore>, local_id: String, delay: Duration) -> JoinHandle<()> {
    debug!(%local_id, ?delay, "Scheduling delayed delete");
    tokio::spawn(async move {
        if let Err(e) = delayed_delete(store.as_ref(), &local_id, delay).await {
            error!(%local_id, "Delayed delete after use failed: {}", e);
        }
    })
}
