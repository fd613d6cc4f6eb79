//! # Registry Controller
//!
//! Orchestrates every device operation for an authenticated caller:
//! ownership checks, timestamps, visibility, adoption through the device
//! manager, and change events for the caller's live sessions.
//!
//! Ownership rules:
//! - `read`, `use`, `delete`, `hide`, `show` on a record owned by someone else
//!   fail with [`RegistryError::Forbidden`].
//! - `set` on an existing record owned by someone else fails with
//!   [`RegistryError::NotFound`], so ids of other tenants cannot be probed.
//!
//! Batch variants apply the single operation in input order and stop at the
//! first failure.

pub mod cleanup;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::{AuthToken, Clock};
use crate::devicemanager::DeviceManager;
use crate::error::{RegistryError, RegistryResult};
use crate::model::{Device, DeviceEvent, DeviceList, ListOptions, UpdateKind};
use crate::persistence::DeviceStore;
use crate::realtime::SubscriptionRegistry;

#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    /// Wait before the safety-net delete that follows an adoption. `None` disables it.
    pub delete_after_use_wait: Option<Duration>,
}

pub struct Controller {
    store: Arc<dyn DeviceStore>,
    device_manager: Arc<dyn DeviceManager>,
    events: Arc<SubscriptionRegistry>,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
}

impl Controller {
    pub fn new(
        store: Arc<dyn DeviceStore>,
        device_manager: Arc<dyn DeviceManager>,
        events: Arc<SubscriptionRegistry>,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
    ) -> Self {
        Self { store, device_manager, events, clock, config }
    }

    pub fn events(&self) -> &Arc<SubscriptionRegistry> {
        &self.events
    }

    pub fn store(&self) -> &Arc<dyn DeviceStore> {
        &self.store
    }

    /// Reads a record and checks the caller owns it.
    async fn read_owned(&self, token: &AuthToken, local_id: &str) -> RegistryResult<Device> {
        let device = self.store.read_device(local_id).await?;
        if !device.is_owned_by(&token.user_id) {
            debug!(local_id, user_id = %token.user_id, "Ownership check failed");
            return Err(RegistryError::Forbidden(format!("device {local_id} belongs to another user")));
        }
        Ok(device)
    }

    pub async fn list_devices(&self, token: &AuthToken, options: ListOptions) -> RegistryResult<DeviceList> {
        let (result, total) = self.store.list_devices(&token.user_id, &options).await?;
        Ok(DeviceList {
            total,
            limit: options.limit,
            offset: options.offset,
            sort: options.sort,
            search: options.search,
            result,
        })
    }

    pub async fn read_device(&self, token: &AuthToken, local_id: &str) -> RegistryResult<Device> {
        self.read_owned(token, local_id).await
    }

    /// Create-or-update. New records always start visible; updates keep the
    /// original creation time and take `hidden` from the payload.
    pub async fn set_device(&self, token: &AuthToken, mut device: Device) -> RegistryResult<Device> {
        if device.local_id.is_empty() {
            return Err(RegistryError::invalid("missing local_id"));
        }
        let now = self.clock.now();
        match self.store.read_device(&device.local_id).await {
            Ok(existing) if !existing.is_owned_by(&token.user_id) => {
                return Err(RegistryError::not_found(format!("device {}", device.local_id)));
            }
            Ok(existing) => {
                device.created_at = existing.created_at;
            }
            Err(RegistryError::NotFound(_)) => {
                device.created_at = now;
                device.hidden = false;
            }
            Err(e) => return Err(e),
        }
        device.updated_at = now;
        device.user_id = token.user_id.clone();

        self.store.set_device(device.clone()).await?;
        self.events.trigger(&token.user_id, DeviceEvent::new(UpdateKind::Set, device.local_id.clone()));
        Ok(device)
    }

    pub async fn set_multiple_devices(&self, token: &AuthToken, devices: Vec<Device>) -> RegistryResult<Vec<Device>> {
        let mut written = Vec::with_capacity(devices.len());
        for device in devices {
            written.push(self.set_device(token, device).await?);
        }
        Ok(written)
    }

    /// Adopts the device into the device manager, then removes it here.
    pub async fn use_device(&self, token: &AuthToken, local_id: &str) -> RegistryResult<()> {
        let device = self.read_owned(token, local_id).await?;
        self.device_manager.adopt(token, &device).await?;

        if let Some(wait) = self.config.delete_after_use_wait {
            cleanup::schedule_delayed_delete(Arc::clone(&self.store), local_id.to_string(), wait);
        }
        self.store.remove_device(local_id).await?;
        info!(local_id, user_id = %token.user_id, "Device adopted");
        self.events.trigger(&token.user_id, DeviceEvent::new(UpdateKind::Use, local_id));
        Ok(())
    }

    pub async fn use_multiple_devices(&self, token: &AuthToken, local_ids: &[String]) -> RegistryResult<()> {
        for local_id in local_ids {
            self.use_device(token, local_id).await?;
        }
        Ok(())
    }

    pub async fn delete_device(&self, token: &AuthToken, local_id: &str) -> RegistryResult<()> {
        self.read_owned(token, local_id).await?;
        self.store.remove_device(local_id).await?;
        self.events.trigger(&token.user_id, DeviceEvent::new(UpdateKind::Delete, local_id));
        Ok(())
    }

    pub async fn delete_multiple_devices(&self, token: &AuthToken, local_ids: &[String]) -> RegistryResult<()> {
        for local_id in local_ids {
            self.delete_device(token, local_id).await?;
        }
        Ok(())
    }

    async fn set_hidden(&self, token: &AuthToken, local_id: &str, hidden: bool) -> RegistryResult<()> {
        let mut device = self.read_owned(token, local_id).await?;
        device.hidden = hidden;
        self.store.set_device(device).await?;
        self.events.trigger(&token.user_id, DeviceEvent::new(UpdateKind::Set, local_id));
        Ok(())
    }

    pub async fn hide_device(&self, token: &AuthToken, local_id: &str) -> RegistryResult<()> {
        self.set_hidden(token, local_id, true).await
    }

    pub async fn hide_multiple_devices(&self, token: &AuthToken, local_ids: &[String]) -> RegistryResult<()> {
        for local_id in local_ids {
            self.set_hidden(token, local_id, true).await?;
        }
        Ok(())
    }

    pub async fn show_device(&self, token: &AuthToken, local_id: &str) -> RegistryResult<()> {
        self.set_hidden(token, local_id, false).await
    }

    pub async fn show_multiple_devices(&self, token: &AuthToken, local_ids: &[String]) -> RegistryResult<()> {
        for local_id in local_ids {
            self.set_hidden(token, local_id, false).await?;
        }
        Ok(())
    }
}
