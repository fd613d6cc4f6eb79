//! # Device Manager Client
//!
//! Adopting a waiting device hands it to the device manager service, which
//! owns the long-lived device inventory. The call is made on behalf of the
//! caller: their bearer token is forwarded as-is.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::AuthToken;
use crate::error::{RegistryError, RegistryResult};
use crate::model::{Attribute, Device};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts devices leaving the waiting room.
#[async_trait]
pub trait DeviceManager: Send + Sync {
    async fn adopt(&self, token: &AuthToken, device: &Device) -> RegistryResult<()>;
}

/// Body of `POST {base}/devices`: the device without registry metadata.
#[derive(Debug, Serialize)]
struct AdoptionRequest<'a> {
    id: &'a str,
    local_id: &'a str,
    name: &'a str,
    device_type_id: &'a str,
    attributes: Option<&'a [Attribute]>,
}

impl<'a> From<&'a Device> for AdoptionRequest<'a> {
    fn from(device: &'a Device) -> Self {
        AdoptionRequest {
            id: &device.id,
            local_id: &device.local_id,
            name: &device.name,
            device_type_id: &device.device_type_id,
            attributes: device.attributes.as_deref(),
        }
    }
}

pub struct HttpDeviceManager {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceManager {
    pub fn new(base_url: impl Into<String>) -> RegistryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::internal(format!("failed to build http client: {e}")))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl DeviceManager for HttpDeviceManager {
    async fn adopt(&self, token: &AuthToken, device: &Device) -> RegistryResult<()> {
        let url = format!("{}/devices", self.base_url);
        debug!(local_id = %device.local_id, %url, "Handing device to device manager");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, &token.token)
            .json(&AdoptionRequest::from(device))
            .send()
            .await
            .map_err(|e| RegistryError::internal(format!("device manager request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let message = response.text().await.unwrap_or_default();
            warn!(local_id = %device.local_id, status = status.as_u16(), "Device manager rejected device");
            return Err(RegistryError::Upstream { status: status.as_u16(), message });
        }
        Ok(())
    }
}
