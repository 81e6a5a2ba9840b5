//! Best-effort emission of audit events and notifications.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;

use super::{DoorEvent, Notification};
use crate::store::{EventSink, StoreError};

/// Failure of a notification publish attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotifyError {
    /// The attempt exceeded its time bound.
    #[error("notification publish timed out after {0:?}")]
    Timeout(Duration),

    /// The channel rejected the message.
    #[error("notification channel error: {0}")]
    Channel(String),
}

/// Outcome of a publish attempt.
///
/// Deliberately not a `Result`: nothing here is fatal to the operation that
/// published. Callers log a `Dropped` outcome and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The channel accepted the message. Delivery is still not guaranteed.
    Sent,
    /// The attempt failed; the message is gone.
    Dropped,
}

/// A publish/subscribe channel for door-change notifications.
///
/// Implementations must return within the supplied `timeout`, reporting
/// [`NotifyError::Timeout`] if the attempt exceeds it; the emitter makes
/// exactly one attempt and never blocks the calling operation beyond the
/// bound. No acknowledgment is expected.
pub trait Notifier: Send + Sync {
    /// Publishes one notification within the given time bound.
    fn publish(&self, notification: &Notification, timeout: Duration) -> Result<(), NotifyError>;
}

/// Records audit events and publishes notifications for door transitions.
///
/// Both paths are best-effort by contract: [`EventEmitter::record`] and
/// [`EventEmitter::publish`] log failures and swallow them, so auxiliary
/// bookkeeping can never block a door.
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
    topic: String,
    publish_timeout: Duration,
}

impl EventEmitter {
    /// Creates an emitter publishing on the given topic, bounding each
    /// publish attempt by `publish_timeout`.
    #[must_use]
    pub fn new(
        sink: Arc<dyn EventSink>,
        notifier: Arc<dyn Notifier>,
        topic: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            sink,
            notifier,
            topic: topic.into(),
            publish_timeout,
        }
    }

    /// Appends one event to the audit trail, best-effort.
    pub fn record(&self, event: &DoorEvent) {
        if let Err(err) = self.sink.append(event) {
            tracing::warn!(
                door_id = %event.door_id,
                event_type = event.event_type.as_str(),
                error = %err,
                "failed to append door event, continuing"
            );
        }
    }

    /// Publishes one notification, best-effort.
    pub fn publish(&self, event: &str, payload: serde_json::Value) -> PublishOutcome {
        let notification = Notification {
            topic: self.topic.clone(),
            event: event.to_string(),
            payload,
        };
        match self.notifier.publish(&notification, self.publish_timeout) {
            Ok(()) => PublishOutcome::Sent,
            Err(err) => {
                tracing::warn!(
                    topic = %notification.topic,
                    event = %notification.event,
                    error = %err,
                    "failed to publish door notification, continuing"
                );
                PublishOutcome::Dropped
            },
        }
    }
}

/// In-memory audit sink, append-only.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: RwLock<Vec<DoorEvent>>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events in order.
    pub fn events(&self) -> Result<Vec<DoorEvent>, StoreError> {
        let events = self.events.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(events.clone())
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> Result<usize, StoreError> {
        let events = self.events.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(events.len())
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl EventSink for MemoryEventSink {
    fn append(&self, event: &DoorEvent) -> Result<(), StoreError> {
        let mut events = self.events.write().map_err(|_| StoreError::LockPoisoned)?;
        events.push(event.clone());
        Ok(())
    }
}

/// In-memory notifier that keeps every published message.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notifications: RwLock<Vec<Notification>>,
}

impl MemoryNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the published notifications in order.
    #[must_use]
    pub fn published(&self) -> Vec<Notification> {
        self.notifications
            .read()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn publish(&self, notification: &Notification, _timeout: Duration) -> Result<(), NotifyError> {
        let mut notifications = self
            .notifications
            .write()
            .map_err(|_| NotifyError::Channel("lock poisoned".to_string()))?;
        notifications.push(notification.clone());
        Ok(())
    }
}
