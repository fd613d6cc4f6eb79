//! # Persistence
//!
//! The [`DeviceStore`] port and its backends:
//! - [`mongo::MongoStore`]: document store, full-text search over indexed tokens.
//! - [`postgres::PostgresStore`]: relational store, case-insensitive substring search.
//! - [`memory::MemoryStore`]: in-process store for tests and local runs.
//!
//! Every backend call is bounded by [`STORAGE_TIMEOUT`]. [`migration`] copies
//! all records from one backend into another.

pub mod memory;
pub mod migration;
#[cfg(feature = "mongo")]
pub mod mongo;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RegistryError, RegistryResult};
use crate::model::{Device, ListOptions};

pub use memory::MemoryStore;
pub use migration::{migrate, MIGRATION_BATCH_SIZE};

/// Upper bound for a single storage call.
pub const STORAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// The storage port. Implementations do not enforce ownership on reads and
/// writes; [`crate::controller::Controller`] does.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// One page of `user_id`'s devices plus the total matching the same filter.
    async fn list_devices(&self, user_id: &str, options: &ListOptions) -> RegistryResult<(Vec<Device>, i64)>;

    /// The record with `local_id`, regardless of owner.
    async fn read_device(&self, local_id: &str) -> RegistryResult<Device>;

    /// Upsert by `local_id`.
    async fn set_device(&self, device: Device) -> RegistryResult<()>;

    /// Delete by `local_id`. Deleting a missing record succeeds.
    async fn remove_device(&self, local_id: &str) -> RegistryResult<()>;

    /// All records across owners, ordered by `local_id`, for migration.
    async fn export_page(&self, offset: i64, limit: i64) -> RegistryResult<Vec<Device>>;

    /// Copy every record into `target`. Returns the number of records copied.
    async fn migrate_to(&self, target: &dyn DeviceStore) -> RegistryResult<u64> {
        migrate(self, target, MIGRATION_BATCH_SIZE).await
    }

    /// Release connections. Called once on shutdown.
    async fn close(&self) {}
}

/// Bounds a storage future by [`STORAGE_TIMEOUT`].
pub(crate) async fn with_timeout<T, F>(fut: F) -> RegistryResult<T>
where
    F: Future<Output = RegistryResult<T>>,
{
    tokio::time::timeout(STORAGE_TIMEOUT, fut)
        .await
        .map_err(|_| RegistryError::internal("storage call timed out"))?
}

/// Selectable persistent backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Mongo,
    Postgres,
}

impl FromStr for BackendKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(BackendKind::Mongo),
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            other => Err(RegistryError::invalid(format!("unknown storage backend '{other}'"))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Mongo => "mongo",
            BackendKind::Postgres => "postgres",
        })
    }
}

/// Connection settings for both persistent backends.
#[derive(Debug, Clone, Default)]
pub struct StoreSettings {
    pub mongo_url: String,
    pub mongo_database: String,
    pub mongo_collection: String,
    pub postgres_conn_str: String,
}

/// Connects the selected backend, creating indexes or tables as needed.
pub async fn connect(kind: BackendKind, settings: &StoreSettings) -> RegistryResult<Arc<dyn DeviceStore>> {
    match kind {
        #[cfg(feature = "mongo")]
        BackendKind::Mongo => {
            let store = mongo::MongoStore::connect(
                &settings.mongo_url,
                &settings.mongo_database,
                &settings.mongo_collection,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        BackendKind::Postgres => {
            let store = postgres::PostgresStore::connect(&settings.postgres_conn_str).await?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => Err(RegistryError::invalid(format!("backend '{other}' is not compiled in"))),
    }
}
