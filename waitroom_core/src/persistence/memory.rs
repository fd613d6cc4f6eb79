//! # In-Memory Store
//!
//! A [`DeviceStore`] over a `BTreeMap` keyed by `local_id`. Search matches
//! case-insensitive substrings of `local_id` or `name`, like the relational
//! backend. Used by tests and for running the server without a database.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::DeviceStore;
use crate::error::{RegistryError, RegistryResult};
use crate::model::{Device, ListOptions, SortField, SortSpec};

#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: RwLock<BTreeMap<String, Device>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|devices| devices.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RegistryResult<RwLockReadGuard<'_, BTreeMap<String, Device>>> {
        self.devices
            .read()
            .map_err(|_| RegistryError::internal("memory store lock poisoned"))
    }

    fn write(&self) -> RegistryResult<RwLockWriteGuard<'_, BTreeMap<String, Device>>> {
        self.devices
            .write()
            .map_err(|_| RegistryError::internal("memory store lock poisoned"))
    }
}

fn compare(spec: SortSpec, a: &Device, b: &Device) -> Ordering {
    let primary = match spec.field {
        SortField::LocalId => a.local_id.cmp(&b.local_id),
        SortField::Name => a.name.cmp(&b.name),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    };
    let primary = if spec.is_desc() { primary.reverse() } else { primary };
    primary.then_with(|| a.local_id.cmp(&b.local_id))
}

fn matches_search(device: &Device, needle: &str) -> bool {
    device.local_id.to_lowercase().contains(needle) || device.name.to_lowercase().contains(needle)
}

fn page<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl DeviceStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_devices(&self, user_id: &str, options: &ListOptions) -> RegistryResult<(Vec<Device>, i64)> {
        let spec = options.validate()?;
        let needle = options.search_term().map(str::to_lowercase);

        let mut matching: Vec<Device> = self
            .read()?
            .values()
            .filter(|d| d.user_id == user_id)
            .filter(|d| options.show_hidden || !d.hidden)
            .filter(|d| needle.as_deref().is_none_or(|n| matches_search(d, n)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare(spec, a, b));

        let total = matching.len() as i64;
        Ok((page(matching, options.offset, options.limit), total))
    }

    async fn read_device(&self, local_id: &str) -> RegistryResult<Device> {
        self.read()?
            .get(local_id)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(format!("device {local_id}")))
    }

    async fn set_device(&self, device: Device) -> RegistryResult<()> {
        self.write()?.insert(device.local_id.clone(), device);
        Ok(())
    }

    async fn remove_device(&self, local_id: &str) -> RegistryResult<()> {
        self.write()?.remove(local_id);
        Ok(())
    }

    async fn export_page(&self, offset: i64, limit: i64) -> RegistryResult<Vec<Device>> {
        let all: Vec<Device> = self.read()?.values().cloned().collect();
        Ok(page(all, offset, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(local_id: &str, name: &str, user: &str) -> Device {
        Device { user_id: user.into(), ..Device::new(local_id, name) }
    }

    #[tokio::test]
    async fn search_matches_substrings_case_insensitively() {
        let store = MemoryStore::new();
        store.set_device(owned("a", "HYD WATER 2520611", "u")).await.unwrap();
        store.set_device(owned("b", "TECH AIR 2520622", "u")).await.unwrap();
        store.set_device(owned("c", "other", "u")).await.unwrap();

        let options = ListOptions { search: "252".into(), ..Default::default() };
        let (page, total) = store.list_devices("u", &options).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.iter().map(|d| d.local_id.as_str()).collect::<Vec<_>>(), ["a", "b"]);

        let options = ListOptions { search: "water".into(), ..Default::default() };
        assert_eq!(store.list_devices("u", &options).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn desc_sort_keeps_local_id_as_tie_breaker() {
        let store = MemoryStore::new();
        for id in ["1", "2", "3"] {
            store.set_device(owned(id, "same", "u")).await.unwrap();
        }
        store.set_device(owned("4", "zzz", "u")).await.unwrap();

        let options = ListOptions { sort: "name.desc".into(), ..Default::default() };
        let (page, _) = store.list_devices("u", &options).await.unwrap();
        assert_eq!(page.iter().map(|d| d.local_id.as_str()).collect::<Vec<_>>(), ["4", "1", "2", "3"]);
    }

    #[tokio::test]
    async fn export_pages_follow_local_id_order() {
        let store = MemoryStore::new();
        for id in ["c", "a", "b"] {
            store.set_device(owned(id, id, "u")).await.unwrap();
        }
        let first = store.export_page(0, 2).await.unwrap();
        let second = store.export_page(2, 2).await.unwrap();
        assert_eq!(first.iter().map(|d| d.local_id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(second.len(), 1);
        assert!(store.export_page(3, 2).await.unwrap().is_empty());
    }
}
