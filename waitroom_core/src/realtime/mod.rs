//! # Realtime Notifications
//!
//! Owners follow changes to their waiting devices over a websocket. The
//! [`registry::SubscriptionRegistry`] maps authenticated connections to owners
//! and fans change events out; [`session::Session`] drives the per-connection
//! protocol (authentication, re-authentication on expiry, liveness pings)
//! independently of the websocket library in use.

pub mod registry;
pub mod session;

use thiserror::Error;

pub use registry::{EventSender, SubscriptionRegistry};
pub use session::{Incoming, Session, SessionConfig, SocketWriter};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("websocket transport error: {0}")]
    Transport(String),
    #[error("failed to encode message: {0}")]
    Encode(String),
    #[error("connection closed")]
    Closed,
}
