//! # Session Protocol
//!
//! Drives one websocket connection:
//!
//! 1. The client sends `{"type":"auth","payload":"<token>"}`. Any previous
//!    subscription of the connection is dropped first. An invalid token is
//!    answered with an `error` frame carrying the reason, an expired one with
//!    `error` / `expired auth token`. A valid token subscribes the connection
//!    to its owner's events and is answered with `auth_ok`.
//! 2. Each delivered event is checked against the token's expiry. An expired
//!    token unsubscribes the connection and sends `auth_request` instead of the
//!    event; the client re-authenticates with a fresh `auth` frame.
//! 3. A ping is written every `ping_period` until the session closes.
//! 4. The session closes on a close frame, a read error, server shutdown, or a
//!    failed write while delivering an event. Closing unsubscribes.
//!
//! Frames of any other type are ignored. Unparseable frames are answered with
//! an `error` frame and the session continues.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::{EventSender, SubscriptionRegistry};
use super::SessionError;
use crate::auth::{AuthError, AuthToken, Clock, TokenValidator};
use crate::model::{DeviceEvent, EventKind, EventMessage};

/// Write half of a websocket, as seen by the session.
#[async_trait]
pub trait SocketWriter: Send + Sync {
    async fn send_message(&self, message: &EventMessage) -> Result<(), SessionError>;
    async fn send_ping(&self) -> Result<(), SessionError>;
    /// Sends a close frame if the transport has one.
    async fn close(&self) {}
}

/// Read-side frames, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    Close,
    /// Pings, pongs, binary frames.
    Other,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ping_period: Duration,
    /// Log ignored frames at info level.
    pub debug: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ping_period: Duration::from_secs(30), debug: false }
    }
}

pub struct Session {
    connection_id: String,
    registry: Arc<SubscriptionRegistry>,
    validator: Arc<dyn TokenValidator>,
    clock: Arc<dyn Clock>,
    writer: Arc<dyn SocketWriter>,
    config: SessionConfig,
    closed: CancellationToken,
}

impl Session {
    pub fn new(
        connection_id: impl Into<String>,
        registry: Arc<SubscriptionRegistry>,
        validator: Arc<dyn TokenValidator>,
        clock: Arc<dyn Clock>,
        writer: Arc<dyn SocketWriter>,
        config: SessionConfig,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            registry,
            validator,
            clock,
            writer,
            config,
            closed: CancellationToken::new(),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Token that is cancelled once the session has closed.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Runs the session until the connection ends or `shutdown` is cancelled.
    pub async fn run<S>(self, mut incoming: S, shutdown: CancellationToken)
    where
        S: Stream<Item = Result<Incoming, SessionError>> + Unpin + Send,
    {
        info!(connection_id = %self.connection_id, "Session opened");
        let pinger = tokio::spawn(ping_loop(
            Arc::clone(&self.writer),
            self.closed.clone(),
            self.config.ping_period,
            self.connection_id.clone(),
        ));

        loop {
            let frame = tokio::select! {
                _ = self.closed.cancelled() => break,
                _ = shutdown.cancelled() => {
                    debug!(connection_id = %self.connection_id, "Closing session for shutdown");
                    break;
                }
                frame = incoming.next() => frame,
            };
            match frame {
                Some(Ok(Incoming::Text(text))) => {
                    if let Err(e) = self.handle_text(&text).await {
                        warn!(connection_id = %self.connection_id, "Failed to answer client: {}", e);
                        break;
                    }
                }
                Some(Ok(Incoming::Other)) => {}
                Some(Ok(Incoming::Close)) | None => break,
                Some(Err(e)) => {
                    warn!(connection_id = %self.connection_id, "Read failed: {}", e);
                    break;
                }
            }
        }

        self.close();
        let _ = pinger.await;
        self.writer.close().await;
        info!(connection_id = %self.connection_id, "Session closed");
    }

    fn close(&self) {
        self.closed.cancel();
        self.registry.unsubscribe(&self.connection_id);
    }

    async fn handle_text(&self, text: &str) -> Result<(), SessionError> {
        let message: EventMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(connection_id = %self.connection_id, "Unparseable frame: {}", e);
                return self.writer.send_message(&EventMessage::error(format!("invalid message: {e}"))).await;
            }
        };
        match message.kind {
            EventKind::Auth => self.handle_auth(&message.payload).await,
            other => {
                if self.config.debug {
                    info!(connection_id = %self.connection_id, kind = ?other, "Ignoring client frame");
                }
                Ok(())
            }
        }
    }

    async fn handle_auth(&self, credential: &str) -> Result<(), SessionError> {
        self.registry.unsubscribe(&self.connection_id);

        let token = match self.validator.validate(credential) {
            Ok(token) => token,
            Err(e) => {
                debug!(connection_id = %self.connection_id, "Rejected credential: {}", e);
                return self.writer.send_message(&EventMessage::error(e.to_string())).await;
            }
        };
        if token.is_expired(self.clock.now()) {
            return self.writer.send_message(&EventMessage::error(AuthError::Expired.to_string())).await;
        }

        let user_id = token.user_id.clone();
        let sender = SessionSender {
            connection_id: self.connection_id.clone(),
            token,
            registry: Arc::downgrade(&self.registry),
            clock: Arc::clone(&self.clock),
            writer: Arc::clone(&self.writer),
            closed: self.closed.clone(),
        };
        self.registry.subscribe(&self.connection_id, &user_id, Arc::new(sender));
        self.writer.send_message(&EventMessage::auth_ok()).await
    }
}

async fn ping_loop(writer: Arc<dyn SocketWriter>, closed: CancellationToken, period: Duration, connection_id: String) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let sent = tokio::select! {
            _ = closed.cancelled() => break,
            sent = writer.send_ping() => sent,
        };
        if let Err(e) = sent {
            warn!(%connection_id, "Ping failed: {}", e);
            closed.cancel();
            break;
        }
    }
}

/// The subscription end of a session.
struct SessionSender {
    connection_id: String,
    token: AuthToken,
    registry: Weak<SubscriptionRegistry>,
    clock: Arc<dyn Clock>,
    writer: Arc<dyn SocketWriter>,
    closed: CancellationToken,
}

impl SessionSender {
    async fn write(&self, message: &EventMessage) -> Result<(), SessionError> {
        if let Err(e) = self.writer.send_message(message).await {
            warn!(connection_id = %self.connection_id, "Event write failed, closing: {}", e);
            self.closed.cancel();
            if let Some(registry) = self.registry.upgrade() {
                registry.unsubscribe(&self.connection_id);
            }
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl EventSender for SessionSender {
    async fn send(&self, event: &DeviceEvent) -> Result<(), SessionError> {
        if self.token.is_expired(self.clock.now()) {
            debug!(connection_id = %self.connection_id, "Token expired, requesting re-auth");
            if let Some(registry) = self.registry.upgrade() {
                registry.unsubscribe(&self.connection_id);
            }
            return self.write(&EventMessage::auth_request()).await;
        }
        self.write(&EventMessage::from(event)).await
    }
}
