//! # Listing
//!
//! Query options for owner-scoped listings and the page they produce.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::device::Device;
use crate::error::{RegistryError, RegistryResult};

pub const DEFAULT_LIMIT: i64 = 100;
pub const DEFAULT_SORT: &str = "local_id";

/// Fields a listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    LocalId,
    Name,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::LocalId => "local_id",
            SortField::Name => "name",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local_id" => Ok(SortField::LocalId),
            "name" => Ok(SortField::Name),
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            other => Err(RegistryError::invalid(format!("unknown sort field '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A parsed `sort` option: `"<field>"` or `"<field>.desc"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn is_desc(&self) -> bool {
        self.direction == SortDirection::Desc
    }
}

impl FromStr for SortSpec {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once('.') {
            Some((field, "desc")) => (field, SortDirection::Desc),
            Some((field, "asc")) => (field, SortDirection::Asc),
            Some((_, other)) => {
                return Err(RegistryError::invalid(format!("unknown sort direction '{other}'")));
            }
            None => (s, SortDirection::Asc),
        };
        Ok(SortSpec { field: field.parse()?, direction })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Asc => f.write_str(self.field.as_str()),
            SortDirection::Desc => write!(f, "{}.desc", self.field.as_str()),
        }
    }
}

/// Options for [`crate::persistence::DeviceStore::list_devices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    pub limit: i64,
    pub offset: i64,
    pub sort: String,
    pub show_hidden: bool,
    pub search: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            sort: DEFAULT_SORT.to_string(),
            show_hidden: false,
            search: String::new(),
        }
    }
}

impl ListOptions {
    /// Rejects negative pagination and unknown sort keys, returning the parsed sort.
    pub fn validate(&self) -> RegistryResult<SortSpec> {
        if self.limit < 0 {
            return Err(RegistryError::invalid("limit must not be negative"));
        }
        if self.offset < 0 {
            return Err(RegistryError::invalid("offset must not be negative"));
        }
        self.sort.parse()
    }

    /// The search term with surrounding whitespace removed, if any is left.
    pub fn search_term(&self) -> Option<&str> {
        let term = self.search.trim();
        (!term.is_empty()).then_some(term)
    }
}

/// One page of an owner's devices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceList {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub sort: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search: String,
    pub result: Vec<Device>,
}
