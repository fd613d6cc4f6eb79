//! # MongoDB Backend
//!
//! One document per device. The device fields live in a nested `device`
//! sub-document; ownership, visibility and timestamps sit next to it together
//! with a `search_tokens` string covered by a text index.
//!
//! Full-text search matches whole words only, so a term like `"252"` does not
//! find `"HYD WATER 2520611"` here while the relational backend does.

use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{with_timeout, DeviceStore};
use crate::error::{RegistryError, RegistryResult};
use crate::model::{Attribute, Device, ListOptions, SortField, SortSpec};

const LOCAL_ID_KEY: &str = "device.local_id";
const NAME_KEY: &str = "device.name";
const USER_ID_KEY: &str = "user_id";
const HIDDEN_KEY: &str = "hidden";
const CREATED_AT_KEY: &str = "created_at";
const UPDATED_AT_KEY: &str = "updated_at";
const SEARCH_TOKENS_KEY: &str = "search_tokens";

impl From<mongodb::error::Error> for RegistryError {
    fn from(e: mongodb::error::Error) -> Self {
        RegistryError::Internal(format!("mongodb: {e}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeviceFields {
    #[serde(default)]
    id: String,
    local_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    device_type_id: String,
    #[serde(default)]
    attributes: Option<Vec<Attribute>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeviceDocument {
    device: DeviceFields,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    hidden: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
    #[serde(default)]
    search_tokens: String,
}

impl From<Device> for DeviceDocument {
    fn from(device: Device) -> Self {
        let search_tokens = device.search_tokens();
        DeviceDocument {
            device: DeviceFields {
                id: device.id,
                local_id: device.local_id,
                name: device.name,
                device_type_id: device.device_type_id,
                attributes: device.attributes,
            },
            user_id: device.user_id,
            hidden: device.hidden,
            created_at: device.created_at,
            updated_at: device.updated_at,
            search_tokens,
        }
    }
}

impl From<DeviceDocument> for Device {
    fn from(doc: DeviceDocument) -> Self {
        Device {
            id: doc.device.id,
            local_id: doc.device.local_id,
            name: doc.device.name,
            device_type_id: doc.device.device_type_id,
            attributes: doc.device.attributes,
            user_id: doc.user_id,
            hidden: doc.hidden,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

fn sort_key(field: SortField) -> &'static str {
    match field {
        SortField::LocalId => LOCAL_ID_KEY,
        SortField::Name => NAME_KEY,
        SortField::CreatedAt => CREATED_AT_KEY,
        SortField::UpdatedAt => UPDATED_AT_KEY,
    }
}

fn sort_document(spec: SortSpec) -> Document {
    let direction = if spec.is_desc() { -1 } else { 1 };
    let mut sort = doc! { sort_key(spec.field): direction };
    if spec.field != SortField::LocalId {
        sort.insert(LOCAL_ID_KEY, 1);
    }
    sort
}

fn list_filter(user_id: &str, options: &ListOptions) -> Document {
    let mut filter = doc! { USER_ID_KEY: user_id };
    if !options.show_hidden {
        filter.insert(HIDDEN_KEY, false);
    }
    if let Some(term) = options.search_term() {
        filter.insert("$text", doc! { "$search": term });
    }
    filter
}

pub struct MongoStore {
    client: Client,
    collection: Collection<DeviceDocument>,
}

impl MongoStore {
    /// Connects and ensures the indexes exist.
    pub async fn connect(url: &str, database: &str, collection: &str) -> RegistryResult<Self> {
        let client = with_timeout(async { Ok::<_, RegistryError>(Client::with_uri_str(url).await?) }).await?;
        let collection = client.database(database).collection::<DeviceDocument>(collection);
        let store = Self { client, collection };
        store.ensure_indexes().await?;
        info!(database, "Connected to MongoDB");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> RegistryResult<()> {
        let indexes = [
            index(LOCAL_ID_KEY, "devicelocalidindex", true),
            index(NAME_KEY, "devicenameindex", false),
            index(USER_ID_KEY, "deviceuseridindex", false),
            index(HIDDEN_KEY, "devicehiddenindex", false),
            index(CREATED_AT_KEY, "devicecreatedatindex", false),
            index(UPDATED_AT_KEY, "deviceupdatedatindex", false),
            IndexModel::builder()
                .keys(doc! { SEARCH_TOKENS_KEY: "text" })
                .options(IndexOptions::builder().name("searchtokenindex".to_string()).build())
                .build(),
        ];
        with_timeout(async {
            self.collection.create_indexes(indexes).await?;
            Ok::<_, RegistryError>(())
        })
        .await
    }
}

fn index(key: &str, name: &str, unique: bool) -> IndexModel {
    IndexModel::builder()
        .keys(doc! { key: 1 })
        .options(IndexOptions::builder().name(name.to_string()).unique(unique).build())
        .build()
}

#[async_trait]
impl DeviceStore for MongoStore {
    fn name(&self) -> &'static str {
        "mongo"
    }

    #[instrument(skip(self, options), fields(backend = "mongo"))]
    async fn list_devices(&self, user_id: &str, options: &ListOptions) -> RegistryResult<(Vec<Device>, i64)> {
        let spec = options.validate()?;
        let filter = list_filter(user_id, options);

        with_timeout(async {
            let total = self.collection.count_documents(filter.clone()).await? as i64;
            // a zero limit means "no limit" to MongoDB
            if options.limit == 0 {
                return Ok((Vec::new(), total));
            }
            let cursor = self
                .collection
                .find(filter)
                .sort(sort_document(spec))
                .skip(options.offset as u64)
                .limit(options.limit)
                .await?;
            let docs: Vec<DeviceDocument> = cursor.try_collect().await?;
            debug!(user_id, total, returned = docs.len(), "Listed devices");
            Ok::<_, RegistryError>((docs.into_iter().map(Device::from).collect(), total))
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "mongo"))]
    async fn read_device(&self, local_id: &str) -> RegistryResult<Device> {
        with_timeout(async {
            self.collection
                .find_one(doc! { LOCAL_ID_KEY: local_id })
                .await?
                .map(Device::from)
                .ok_or_else(|| RegistryError::not_found(format!("device {local_id}")))
        })
        .await
    }

    #[instrument(skip(self, device), fields(backend = "mongo", local_id = %device.local_id))]
    async fn set_device(&self, device: Device) -> RegistryResult<()> {
        let filter = doc! { LOCAL_ID_KEY: device.local_id.as_str() };
        let document = DeviceDocument::from(device);
        with_timeout(async {
            self.collection.replace_one(filter, &document).upsert(true).await?;
            Ok::<_, RegistryError>(())
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "mongo"))]
    async fn remove_device(&self, local_id: &str) -> RegistryResult<()> {
        with_timeout(async {
            self.collection.delete_many(doc! { LOCAL_ID_KEY: local_id }).await?;
            Ok::<_, RegistryError>(())
        })
        .await
    }

    async fn export_page(&self, offset: i64, limit: i64) -> RegistryResult<Vec<Device>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        with_timeout(async {
            let cursor = self
                .collection
                .find(doc! {})
                .sort(doc! { LOCAL_ID_KEY: 1 })
                .skip(offset.max(0) as u64)
                .limit(limit)
                .await?;
            let docs: Vec<DeviceDocument> = cursor.try_collect().await?;
            Ok::<_, RegistryError>(docs.into_iter().map(Device::from).collect())
        })
        .await
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        info!("MongoDB client shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_nest_device_fields_and_carry_search_tokens() {
        let device = Device { user_id: "u".into(), ..Device::new("id1", "HEAT_COST") };
        let document = bson::to_document(&DeviceDocument::from(device.clone())).unwrap();

        assert_eq!(document.get_document("device").unwrap().get_str("local_id").unwrap(), "id1");
        assert_eq!(document.get_str(SEARCH_TOKENS_KEY).unwrap(), "id1 HEAT_COST HEAT COST");
        assert!(document.get_datetime(CREATED_AT_KEY).is_ok());

        let back: DeviceDocument = bson::from_document(document).unwrap();
        assert_eq!(Device::from(back), device);
    }

    #[test]
    fn list_filter_hides_hidden_unless_asked() {
        let options = ListOptions::default();
        assert_eq!(list_filter("u", &options), doc! { USER_ID_KEY: "u", HIDDEN_KEY: false });

        let options = ListOptions { show_hidden: true, search: "bar".into(), ..Default::default() };
        assert_eq!(
            list_filter("u", &options),
            doc! { USER_ID_KEY: "u", "$text": { "$search": "bar" } }
        );
    }

    #[test]
    fn sort_document_breaks_ties_by_local_id() {
        let spec: SortSpec = "updated_at.desc".parse().unwrap();
        assert_eq!(sort_document(spec), doc! { UPDATED_AT_KEY: -1, LOCAL_ID_KEY: 1 });
        let spec: SortSpec = "local_id".parse().unwrap();
        assert_eq!(sort_document(spec), doc! { LOCAL_ID_KEY: 1 });
    }
}
