//! # PostgreSQL Backend
//!
//! A single `devices` table keyed by `local_id`. Attributes are stored as a
//! JSON column. Search is a case-insensitive substring match on `local_id`
//! or `name`, so partial numbers such as `"252"` find `"TECH AIR 2520622"`.
//!
//! Connections come from a `deadpool_postgres` pool using fast recycling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config as DeadpoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info, instrument};

use super::{with_timeout, DeviceStore};
use crate::error::{RegistryError, RegistryResult};
use crate::model::{Attribute, Device, ListOptions, SortField, SortSpec};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS devices (
    local_id TEXT PRIMARY KEY,
    id TEXT,
    name TEXT,
    device_type_id TEXT,
    attributes JSON,
    user_id TEXT,
    hidden BOOL,
    created_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ
)";

const SELECT_COLUMNS: &str =
    "SELECT local_id, id, name, device_type_id, attributes, user_id, hidden, created_at, updated_at FROM devices";

const UPSERT: &str = "INSERT INTO devices
    (local_id, id, name, device_type_id, attributes, user_id, hidden, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (local_id) DO UPDATE SET
        id = EXCLUDED.id,
        name = EXCLUDED.name,
        device_type_id = EXCLUDED.device_type_id,
        attributes = EXCLUDED.attributes,
        user_id = EXCLUDED.user_id,
        hidden = EXCLUDED.hidden,
        created_at = EXCLUDED.created_at,
        updated_at = EXCLUDED.updated_at";

type SqlParam = Box<dyn ToSql + Sync + Send>;

impl From<tokio_postgres::Error> for RegistryError {
    fn from(e: tokio_postgres::Error) -> Self {
        RegistryError::Internal(format!("postgres: {e}"))
    }
}

impl From<deadpool_postgres::PoolError> for RegistryError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        RegistryError::Internal(format!("postgres pool: {e}"))
    }
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::LocalId => "local_id",
        SortField::Name => "name",
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
    }
}

fn order_clause(spec: SortSpec) -> String {
    let direction = if spec.is_desc() { "DESC" } else { "ASC" };
    match spec.field {
        SortField::LocalId => format!("ORDER BY local_id {direction}"),
        field => format!("ORDER BY {} {direction}, local_id ASC", sort_column(field)),
    }
}

/// Escapes LIKE wildcards so the term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// `WHERE` clause and its parameters for an owner-scoped listing.
fn where_clause(user_id: &str, options: &ListOptions) -> (String, Vec<SqlParam>) {
    let mut params: Vec<SqlParam> = vec![Box::new(user_id.to_string())];
    let mut clause = String::from("WHERE user_id = $1");
    if !options.show_hidden {
        clause.push_str(" AND hidden = false");
    }
    if let Some(term) = options.search_term() {
        params.push(Box::new(like_pattern(term)));
        let n = params.len();
        clause.push_str(&format!(" AND (local_id ILIKE ${n} OR name ILIKE ${n})"));
    }
    (clause, params)
}

fn as_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect()
}

/// Value bound to the `attributes` column; a missing list is stored as `[]`.
fn attributes_column(device: &Device) -> Json<&[Attribute]> {
    Json(device.attributes_or_empty())
}

fn device_from_row(row: &Row) -> RegistryResult<Device> {
    let attributes: Option<Json<Option<Vec<Attribute>>>> = row.try_get("attributes")?;
    Ok(Device {
        local_id: row.try_get("local_id")?,
        id: row.try_get::<_, Option<String>>("id")?.unwrap_or_default(),
        name: row.try_get::<_, Option<String>>("name")?.unwrap_or_default(),
        device_type_id: row.try_get::<_, Option<String>>("device_type_id")?.unwrap_or_default(),
        attributes: attributes.and_then(|Json(list)| list),
        user_id: row.try_get::<_, Option<String>>("user_id")?.unwrap_or_default(),
        hidden: row.try_get::<_, Option<bool>>("hidden")?.unwrap_or_default(),
        created_at: row.try_get::<_, Option<DateTime<Utc>>>("created_at")?.unwrap_or_default(),
        updated_at: row.try_get::<_, Option<DateTime<Utc>>>("updated_at")?.unwrap_or_default(),
    })
}

pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Creates the pool, checks connectivity and creates the table if missing.
    pub async fn connect(conn_str: &str) -> RegistryResult<Self> {
        let mut pg_pool_config = DeadpoolConfig::new();
        pg_pool_config.url = Some(conn_str.to_string());
        pg_pool_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let pool = pg_pool_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| RegistryError::internal(format!("failed to create postgres pool: {e}")))?;

        let store = Self { pool };
        store.create_table().await?;
        info!("Connected to PostgreSQL");
        Ok(store)
    }

    async fn create_table(&self) -> RegistryResult<()> {
        with_timeout(async {
            let client = self.pool.get().await?;
            client.batch_execute(CREATE_TABLE).await?;
            Ok::<_, RegistryError>(())
        })
        .await
    }
}

#[async_trait]
impl DeviceStore for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self, options), fields(backend = "postgres"))]
    async fn list_devices(&self, user_id: &str, options: &ListOptions) -> RegistryResult<(Vec<Device>, i64)> {
        let spec = options.validate()?;
        let (clause, mut params) = where_clause(user_id, options);
        let count_sql = format!("SELECT COUNT(local_id) FROM devices {clause}");

        params.push(Box::new(options.limit));
        params.push(Box::new(options.offset));
        let select_sql = format!(
            "{SELECT_COLUMNS} {clause} {} LIMIT ${} OFFSET ${}",
            order_clause(spec),
            params.len() - 1,
            params.len()
        );

        with_timeout(async {
            let client = self.pool.get().await?;
            let refs = as_refs(&params);
            let count_params = &refs[..refs.len() - 2];
            let total: i64 = client.query_one(count_sql.as_str(), count_params).await?.try_get(0)?;
            let rows = client.query(select_sql.as_str(), &refs).await?;
            let devices = rows.iter().map(device_from_row).collect::<RegistryResult<Vec<_>>>()?;
            debug!(user_id, total, returned = devices.len(), "Listed devices");
            Ok::<_, RegistryError>((devices, total))
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn read_device(&self, local_id: &str) -> RegistryResult<Device> {
        let sql = format!("{SELECT_COLUMNS} WHERE local_id = $1");
        with_timeout(async {
            let client = self.pool.get().await?;
            match client.query_opt(sql.as_str(), &[&local_id]).await? {
                Some(row) => device_from_row(&row),
                None => Err(RegistryError::not_found(format!("device {local_id}"))),
            }
        })
        .await
    }

    #[instrument(skip(self, device), fields(backend = "postgres", local_id = %device.local_id))]
    async fn set_device(&self, device: Device) -> RegistryResult<()> {
        with_timeout(async {
            let client = self.pool.get().await?;
            client
                .execute(
                    UPSERT,
                    &[
                        &device.local_id,
                        &device.id,
                        &device.name,
                        &device.device_type_id,
                        &attributes_column(&device),
                        &device.user_id,
                        &device.hidden,
                        &device.created_at,
                        &device.updated_at,
                    ],
                )
                .await?;
            Ok::<_, RegistryError>(())
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn remove_device(&self, local_id: &str) -> RegistryResult<()> {
        with_timeout(async {
            let client = self.pool.get().await?;
            client.execute("DELETE FROM devices WHERE local_id = $1", &[&local_id]).await?;
            Ok::<_, RegistryError>(())
        })
        .await
    }

    async fn export_page(&self, offset: i64, limit: i64) -> RegistryResult<Vec<Device>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY local_id ASC LIMIT $1 OFFSET $2");
        with_timeout(async {
            let client = self.pool.get().await?;
            let rows = client.query(sql.as_str(), &[&limit.max(0), &offset.max(0)]).await?;
            rows.iter().map(device_from_row).collect::<RegistryResult<Vec<_>>>()
        })
        .await
    }

    async fn close(&self) {
        self.pool.close();
        info!("PostgreSQL pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_pattern("252"), "%252%");
        assert_eq!(like_pattern("HEAT_COST"), "%HEAT\\_COST%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
    }

    #[test]
    fn where_clause_numbers_search_parameter() {
        let options = ListOptions { search: "bar".into(), ..Default::default() };
        let (clause, params) = where_clause("u", &options);
        assert_eq!(clause, "WHERE user_id = $1 AND hidden = false AND (local_id ILIKE $2 OR name ILIKE $2)");
        assert_eq!(params.len(), 2);

        let options = ListOptions { show_hidden: true, ..Default::default() };
        assert_eq!(where_clause("u", &options).0, "WHERE user_id = $1");
    }

    #[test]
    fn missing_attributes_are_bound_as_empty_list() {
        let device = Device::new("d1", "n");
        assert_eq!(device.attributes, None);
        assert_eq!(serde_json::to_string(&attributes_column(&device).0).unwrap(), "[]");

        let tagged = Device {
            attributes: Some(vec![Attribute { key: "k".into(), value: "v".into(), origin: String::new() }]),
            ..Device::new("d2", "n")
        };
        assert_eq!(serde_json::to_string(&attributes_column(&tagged).0).unwrap(), r#"[{"key":"k","value":"v"}]"#);
    }

    #[test]
    fn order_clause_adds_tie_breaker() {
        assert_eq!(order_clause("name.desc".parse().unwrap()), "ORDER BY name DESC, local_id ASC");
        assert_eq!(order_clause("local_id.desc".parse().unwrap()), "ORDER BY local_id DESC");
    }
}
