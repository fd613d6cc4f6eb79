//! # Data Model
//!
//! Wire and storage shapes shared by every backend and transport.

pub mod device;
pub mod event;
pub mod list;

pub use device::{Attribute, Device};
pub use event::{DeviceEvent, EventKind, EventMessage, UpdateKind};
pub use list::{DeviceList, ListOptions, SortDirection, SortField, SortSpec};
