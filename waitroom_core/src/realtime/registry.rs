//! # Subscription Registry
//!
//! Holds one subscription per authenticated connection. A subscription binds
//! the connection to the owner its token names and to an [`EventSender`]
//! that knows how to reach the socket.
//!
//! [`SubscriptionRegistry::trigger`] snapshots the owner's subscriptions under
//! the lock and delivers outside of it, one task per subscription, so a slow
//! socket never blocks the writer that caused the event or other sockets.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::SessionError;
use crate::model::DeviceEvent;

/// Delivery end of a subscription.
#[async_trait]
pub trait EventSender: Send + Sync {
    async fn send(&self, event: &DeviceEvent) -> Result<(), SessionError>;
}

struct Subscription {
    connection_id: String,
    user_id: String,
    sender: Arc<dyn EventSender>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `connection_id` for `user_id`'s events, replacing any earlier
    /// subscription of the same connection.
    pub fn subscribe(&self, connection_id: &str, user_id: &str, sender: Arc<dyn EventSender>) {
        let mut subscriptions = self.lock();
        subscriptions.retain(|s| s.connection_id != connection_id);
        subscriptions.push(Subscription {
            connection_id: connection_id.to_string(),
            user_id: user_id.to_string(),
            sender,
        });
        debug!(connection_id, user_id, "Subscribed");
    }

    /// Removes the connection's subscription. Returns whether one existed.
    pub fn unsubscribe(&self, connection_id: &str) -> bool {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.connection_id != connection_id);
        let removed = subscriptions.len() != before;
        if removed {
            debug!(connection_id, "Unsubscribed");
        }
        removed
    }

    /// Delivers `event` to every subscription of `user_id` on its own task.
    /// Returns the number of deliveries started. Must run inside a tokio runtime.
    pub fn trigger(&self, user_id: &str, event: DeviceEvent) -> usize {
        let targets: Vec<(String, Arc<dyn EventSender>)> = self
            .lock()
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| (s.connection_id.clone(), Arc::clone(&s.sender)))
            .collect();

        let count = targets.len();
        for (connection_id, sender) in targets {
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = sender.send(&event).await {
                    debug!(%connection_id, local_id = %event.local_id, "Event delivery failed: {}", e);
                }
            });
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_subscribed(&self, connection_id: &str) -> bool {
        self.lock().iter().any(|s| s.connection_id == connection_id)
    }
}
