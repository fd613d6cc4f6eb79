//! # Cross-Backend Migration
//!
//! Pages through every record of a source store in `local_id` order and
//! upserts each one into a target store. Stops at the first failed write;
//! records written before the failure stay in the target. Running it again
//! is safe because writes are upserts.

use tracing::{debug, error, info};

use super::DeviceStore;
use crate::error::{RegistryError, RegistryResult};

pub const MIGRATION_BATCH_SIZE: i64 = 10_000;

pub async fn migrate<S>(source: &S, target: &dyn DeviceStore, batch_size: i64) -> RegistryResult<u64>
where
    S: DeviceStore + ?Sized,
{
    if batch_size <= 0 {
        return Err(RegistryError::invalid("migration batch size must be positive"));
    }
    info!(source = source.name(), target = target.name(), batch_size, "Starting device migration");

    let mut offset = 0;
    let mut copied: u64 = 0;
    loop {
        let batch = source.export_page(offset, batch_size).await?;
        let fetched = batch.len() as i64;
        debug!(offset, fetched, "Migrating batch");

        for device in batch {
            let local_id = device.local_id.clone();
            if let Err(e) = target.set_device(device).await {
                error!(local_id = %local_id, copied, "Migration aborted: {}", e);
                return Err(e);
            }
            copied += 1;
        }

        if fetched < batch_size {
            break;
        }
        offset += batch_size;
    }

    info!(copied, "Device migration finished");
    Ok(copied)
}
