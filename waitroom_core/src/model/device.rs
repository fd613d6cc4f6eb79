//! # Device Records
//!
//! A [`Device`] is a discovered device waiting for adoption, together with the
//! registry metadata that scopes it to one owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters that separate words inside device names ("HEAT_COST_ALLOCATOR").
const NAME_SEPARATORS: [char; 5] = ['_', '-', '.', ':', '/'];

/// A key/value pair describing a device, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,
}

/// A device waiting for adoption.
///
/// `local_id` is the natural key and unique across all owners. `user_id`,
/// `hidden`, `created_at` and `updated_at` are managed by the registry: the
/// controller overwrites whatever a client sends for them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub id: String,
    pub local_id: String,
    pub name: String,
    pub device_type_id: String,
    pub attributes: Option<Vec<Attribute>>,
    pub user_id: String,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Convenience constructor for a record with only the natural key and a name.
    pub fn new(local_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whitespace separated words the document store indexes for full-text search:
    /// the local id, the name, and the name split on common separators.
    pub fn search_tokens(&self) -> String {
        let split_name: String = self
            .name
            .chars()
            .map(|c| if NAME_SEPARATORS.contains(&c) { ' ' } else { c })
            .collect();
        [self.local_id.as_str(), self.name.as_str(), split_name.as_str()].join(" ")
    }

    /// Attributes with a missing list treated as empty.
    pub fn attributes_or_empty(&self) -> &[Attribute] {
        self.attributes.as_deref().unwrap_or(&[])
    }

    /// True when `user_id` owns this record.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
