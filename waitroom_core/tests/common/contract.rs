//! Black-box checks every `DeviceStore` backend must pass identically.
//!
//! Each check uses its own owner and id prefix so they can share one store.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use waitroom_core::model::{Attribute, Device, ListOptions};
use waitroom_core::persistence::DeviceStore;
use waitroom_core::RegistryError;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn device(local_id: &str, name: &str, user_id: &str, minute: i64) -> Device {
    let at = base_time() + Duration::minutes(minute);
    Device {
        id: format!("global-{local_id}"),
        device_type_id: "urn:device-type:meter".into(),
        user_id: user_id.into(),
        created_at: at,
        updated_at: at,
        ..Device::new(local_id, name)
    }
}

fn local_ids(page: &[Device]) -> Vec<&str> {
    page.iter().map(|d| d.local_id.as_str()).collect()
}

async fn list(store: &dyn DeviceStore, user: &str, options: ListOptions) -> (Vec<Device>, i64) {
    store.list_devices(user, &options).await.unwrap()
}

pub async fn read_returns_what_was_written(store: &dyn DeviceStore) {
    let mut written = device("rw-1", "reader", "rw-user", 0);
    written.attributes = Some(vec![
        Attribute { key: "vendor".into(), value: "acme".into(), origin: "scan".into() },
        Attribute { key: "fw".into(), value: "1.2".into(), origin: String::new() },
    ]);
    written.hidden = true;
    store.set_device(written.clone()).await.unwrap();

    assert_eq!(store.read_device("rw-1").await.unwrap(), written);
}

/// Relational storage keeps a missing attribute list as an empty one.
pub async fn missing_attributes_read_back_empty(store: &dyn DeviceStore) {
    let written = device("na-1", "bare", "na-user", 0);
    assert_eq!(written.attributes, None);
    store.set_device(written.clone()).await.unwrap();

    let read = store.read_device("na-1").await.unwrap();
    assert_eq!(read.attributes, Some(Vec::new()));
    assert_eq!(Device { attributes: None, ..read }, written);
}

pub async fn read_missing_is_not_found(store: &dyn DeviceStore) {
    assert!(matches!(store.read_device("nm-missing").await, Err(RegistryError::NotFound(_))));
}

pub async fn upsert_replaces_the_whole_record(store: &dyn DeviceStore) {
    let mut first = device("up-1", "before", "up-user", 0);
    first.attributes = Some(vec![Attribute { key: "a".into(), value: "1".into(), origin: String::new() }]);
    store.set_device(first).await.unwrap();

    let mut second = device("up-1", "after", "up-user-2", 5);
    second.attributes = Some(vec![Attribute { key: "b".into(), value: "2".into(), origin: String::new() }]);
    second.id = String::new();
    store.set_device(second.clone()).await.unwrap();

    assert_eq!(store.read_device("up-1").await.unwrap(), second);
}

pub async fn remove_is_idempotent(store: &dyn DeviceStore) {
    store.set_device(device("rm-1", "gone", "rm-user", 0)).await.unwrap();
    store.remove_device("rm-1").await.unwrap();
    store.remove_device("rm-1").await.unwrap();
    store.remove_device("rm-never-existed").await.unwrap();
    assert!(store.read_device("rm-1").await.is_err());
}

pub async fn listing_is_owner_scoped_and_paginated(store: &dyn DeviceStore) {
    for (i, id) in ["pg-1", "pg-2", "pg-3", "pg-4", "pg-5"].iter().enumerate() {
        store.set_device(device(id, "paged", "pg-user", i as i64)).await.unwrap();
    }
    store.set_device(device("pg-foreign", "paged", "pg-other", 0)).await.unwrap();

    let (page, total) = list(store, "pg-user", ListOptions { limit: 2, offset: 1, ..Default::default() }).await;
    assert_eq!(total, 5);
    assert_eq!(local_ids(&page), ["pg-2", "pg-3"]);

    let (page, total) = list(store, "pg-user", ListOptions { limit: 10, offset: 4, ..Default::default() }).await;
    assert_eq!(total, 5);
    assert_eq!(local_ids(&page), ["pg-5"]);

    let (page, total) = list(store, "pg-user", ListOptions { limit: 10, offset: 50, ..Default::default() }).await;
    assert_eq!(total, 5);
    assert!(page.is_empty());

    let (page, total) = list(store, "pg-user", ListOptions { limit: 0, ..Default::default() }).await;
    assert_eq!(total, 5);
    assert!(page.is_empty());

    let (page, total) = list(store, "pg-nobody", ListOptions::default()).await;
    assert_eq!(total, 0);
    assert!(page.is_empty());
}

pub async fn hidden_records_only_listed_on_request(store: &dyn DeviceStore) {
    store.set_device(device("hd-1", "foo", "hd-user", 0)).await.unwrap();
    let mut hidden = device("hd-2", "bar", "hd-user", 1);
    hidden.hidden = true;
    store.set_device(hidden).await.unwrap();

    let (page, total) = list(store, "hd-user", ListOptions::default()).await;
    assert_eq!(total, 1);
    assert_eq!(local_ids(&page), ["hd-1"]);

    let (page, total) = list(store, "hd-user", ListOptions { show_hidden: true, ..Default::default() }).await;
    assert_eq!(total, 2);
    assert_eq!(local_ids(&page), ["hd-1", "hd-2"]);
}

pub async fn sorting_by_every_field(store: &dyn DeviceStore) {
    store.set_device(device("so-a", "charlie", "so-user", 2)).await.unwrap();
    store.set_device(device("so-b", "alpha", "so-user", 0)).await.unwrap();
    let mut updated_late = device("so-c", "bravo", "so-user", 1);
    updated_late.updated_at = base_time() + Duration::minutes(30);
    store.set_device(updated_late).await.unwrap();

    let sorted = |sort: &str| ListOptions { sort: sort.into(), ..Default::default() };
    assert_eq!(local_ids(&list(store, "so-user", sorted("local_id")).await.0), ["so-a", "so-b", "so-c"]);
    assert_eq!(local_ids(&list(store, "so-user", sorted("local_id.desc")).await.0), ["so-c", "so-b", "so-a"]);
    assert_eq!(local_ids(&list(store, "so-user", sorted("name")).await.0), ["so-b", "so-c", "so-a"]);
    assert_eq!(local_ids(&list(store, "so-user", sorted("name.desc")).await.0), ["so-a", "so-c", "so-b"]);
    assert_eq!(local_ids(&list(store, "so-user", sorted("created_at")).await.0), ["so-b", "so-c", "so-a"]);
    assert_eq!(local_ids(&list(store, "so-user", sorted("updated_at.desc")).await.0), ["so-c", "so-a", "so-b"]);
}

pub async fn invalid_options_are_rejected(store: &dyn DeviceStore) {
    for options in [
        ListOptions { sort: "user_id".into(), ..Default::default() },
        ListOptions { sort: "name.upwards".into(), ..Default::default() },
        ListOptions { limit: -1, ..Default::default() },
        ListOptions { offset: -1, ..Default::default() },
    ] {
        assert!(matches!(
            store.list_devices("iv-user", &options).await,
            Err(RegistryError::InvalidArgument(_))
        ));
    }
}

/// Whole-word search, supported by every backend.
pub async fn word_search_matches_id_and_name(store: &dyn DeviceStore) {
    store.set_device(device("bar", "sw-unrelated", "sw-user", 0)).await.unwrap();
    store.set_device(device("sw-2", "bar", "sw-user", 1)).await.unwrap();
    store.set_device(device("sw-3", "foo", "sw-user", 2)).await.unwrap();
    store.set_device(device("sw-4", "HEAT_COST_ALLOCATOR", "sw-user", 3)).await.unwrap();

    let search = |term: &str| ListOptions { search: term.into(), ..Default::default() };
    let (page, total) = list(store, "sw-user", search("bar")).await;
    assert_eq!(total, 2);
    assert_eq!(local_ids(&page), ["bar", "sw-2"]);

    let (page, _) = list(store, "sw-user", search("foo")).await;
    assert_eq!(local_ids(&page), ["sw-3"]);

    let (page, _) = list(store, "sw-user", search("HEAT")).await;
    assert_eq!(local_ids(&page), ["sw-4"]);

    let (_, total) = list(store, "sw-other", search("bar")).await;
    assert_eq!(total, 0);
}

/// Substring search inside longer tokens. Not provided by the document store.
pub async fn substring_search_matches_inside_words(store: &dyn DeviceStore) {
    store.set_device(device("ss-1", "HYD WATER 2520611", "ss-user", 0)).await.unwrap();
    store.set_device(device("ss-2", "TECH AIR 2520622", "ss-user", 1)).await.unwrap();
    store.set_device(device("ss-3", "OTHER 1234", "ss-user", 2)).await.unwrap();

    let search = |term: &str| ListOptions { search: term.into(), ..Default::default() };
    let (page, total) = list(store, "ss-user", search("252")).await;
    assert_eq!(total, 2);
    assert_eq!(local_ids(&page), ["ss-1", "ss-2"]);

    let (page, total) = list(store, "ss-user", search("520")).await;
    assert_eq!(total, 2);
    assert_eq!(local_ids(&page), ["ss-1", "ss-2"]);

    let (_, total) = list(store, "ss-user", search("water 25")).await;
    assert_eq!(total, 1);
}

pub async fn export_pages_cover_everything_in_order(store: &dyn DeviceStore) {
    for id in ["ex-c", "ex-a", "ex-b"] {
        store.set_device(device(id, "exported", "ex-user", 0)).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut offset = 0;
    loop {
        let page = store.export_page(offset, 2).await.unwrap();
        let done = page.len() < 2;
        seen.extend(page.into_iter().map(|d| d.local_id));
        if done {
            break;
        }
        offset += 2;
    }
    let exported: Vec<&str> = seen.iter().map(String::as_str).filter(|id| id.starts_with("ex-")).collect();
    assert_eq!(exported, ["ex-a", "ex-b", "ex-c"]);
    let mut unique = seen.clone();
    unique.dedup();
    assert_eq!(unique.len(), seen.len(), "export pages overlap");
}

/// Runs every backend-neutral check against one store.
pub async fn run_all(store: &dyn DeviceStore) {
    read_returns_what_was_written(store).await;
    read_missing_is_not_found(store).await;
    upsert_replaces_the_whole_record(store).await;
    remove_is_idempotent(store).await;
    listing_is_owner_scoped_and_paginated(store).await;
    hidden_records_only_listed_on_request(store).await;
    sorting_by_every_field(store).await;
    invalid_options_are_rejected(store).await;
    word_search_matches_id_and_name(store).await;
    export_pages_cover_everything_in_order(store).await;
}

/// Fills `source`, migrates into an empty `target`, and compares both.
pub async fn migration_round_trip(source: &dyn DeviceStore, target: &dyn DeviceStore) {
    let mut originals = Vec::new();
    for i in 0..25 {
        let mut d = device(&format!("mig-{i:02}"), &format!("device {i}"), &format!("mig-user-{}", i % 3), i);
        d.hidden = i % 4 == 0;
        d.attributes = Some(vec![Attribute { key: "n".into(), value: i.to_string(), origin: "test".into() }]);
        source.set_device(d.clone()).await.unwrap();
        originals.push(d);
    }

    let copied = waitroom_core::persistence::migrate(source, target, 10).await.unwrap();
    assert!(copied >= 25);

    for original in &originals {
        assert_eq!(&target.read_device(&original.local_id).await.unwrap(), original);
    }
    for user in ["mig-user-0", "mig-user-1", "mig-user-2"] {
        let options = ListOptions { show_hidden: true, ..Default::default() };
        assert_eq!(
            source.list_devices(user, &options).await.unwrap(),
            target.list_devices(user, &options).await.unwrap()
        );
    }
}
