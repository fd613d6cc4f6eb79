//! # Event Messages
//!
//! JSON frames exchanged over the `/events` websocket:
//! `{"type": "<kind>", "payload": "<text>"}`.

use serde::{Deserialize, Serialize};

/// Frame types. Anything a client sends that is not listed maps to `Unknown`
/// and is ignored by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Auth,
    AuthRequest,
    AuthOk,
    Error,
    UpdateSet,
    UpdateDelete,
    UpdateUse,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload: String,
}

impl EventMessage {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self { kind, payload: payload.into() }
    }

    pub fn auth(credential: impl Into<String>) -> Self {
        Self::new(EventKind::Auth, credential)
    }

    pub fn auth_ok() -> Self {
        Self::new(EventKind::AuthOk, "")
    }

    pub fn auth_request() -> Self {
        Self::new(EventKind::AuthRequest, "")
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message)
    }
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Set,
    Delete,
    Use,
}

/// A change notification for one record, fanned out to the owner's sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub kind: UpdateKind,
    pub local_id: String,
}

impl DeviceEvent {
    pub fn new(kind: UpdateKind, local_id: impl Into<String>) -> Self {
        Self { kind, local_id: local_id.into() }
    }
}

impl From<&DeviceEvent> for EventMessage {
    fn from(event: &DeviceEvent) -> Self {
        let kind = match event.kind {
            UpdateKind::Set => EventKind::UpdateSet,
            UpdateKind::Delete => EventKind::UpdateDelete,
            UpdateKind::Use => EventKind::UpdateUse,
        };
        EventMessage::new(kind, event.local_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_use_type_and_payload_keys() {
        let msg = EventMessage::from(&DeviceEvent::new(UpdateKind::Set, "test_id"));
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"update_set","payload":"test_id"}"#
        );
        assert_eq!(serde_json::to_string(&EventMessage::auth_ok()).unwrap(), r#"{"type":"auth_ok"}"#);
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let msg: EventMessage = serde_json::from_str(r#"{"type":"subscribe","payload":"x"}"#).unwrap();
        assert_eq!(msg.kind, EventKind::Unknown);
        let msg: EventMessage = serde_json::from_str(r#"{"type":"auth"}"#).unwrap();
        assert_eq!(msg, EventMessage::auth(""));
    }
}
