//! # Device Waiting Room Core
//!
//! Transport-agnostic building blocks of the device waiting room: devices that
//! were discovered on the network wait here, owned by exactly one tenant, until
//! the owner adopts them into the device manager or discards them.
//!
//! ## Modules
//! - [`model`]: device records, list pages and websocket event messages.
//! - [`error`]: the error taxonomy every operation reports with.
//! - [`auth`]: bearer token validation and the clock used for expiry checks.
//! - [`persistence`]: the storage port with document, relational and in-memory backends,
//!   plus cross-backend migration.
//! - [`controller`]: ownership rules, visibility toggles and adoption.
//! - [`realtime`]: the subscription registry and the websocket session protocol.
//! - [`devicemanager`]: the client used to hand devices over on adoption.

pub mod auth;
pub mod controller;
pub mod devicemanager;
pub mod error;
pub mod model;
pub mod persistence;
pub mod realtime;

pub use error::{RegistryError, RegistryResult};
pub use model::{Attribute, Device, DeviceList, EventKind, EventMessage, ListOptions};
