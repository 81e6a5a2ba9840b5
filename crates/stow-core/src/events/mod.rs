//! Door audit events and change notifications.
//!
//! Two separate channels leave the engine:
//!
//! - the **audit trail**: append-only [`DoorEvent`] rows, recorded for every
//!   successful transition and never mutated;
//! - **notifications**: fire-and-forget [`Notification`] messages for
//!   realtime subscribers (occupancy dashboards, the locker device itself).
//!
//! Both are best-effort. A failed append or publish is logged and swallowed;
//! it must never roll back the state transition that produced it.

mod emitter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use emitter::{
    EventEmitter, MemoryEventSink, MemoryNotifier, Notifier, NotifyError, PublishOutcome,
};

use crate::door::DoorAction;
use crate::types::{DoorId, UserId};

/// Notification event name for a plain control transition.
pub const EVENT_DOOR_STATUS_CHANGE: &str = "door_status_change";
/// Notification event name for a completed assignment.
pub const EVENT_DOOR_ASSIGNED: &str = "door_assigned";
/// Notification event name for the first open after assignment.
pub const EVENT_DOOR_OPENED_INITIAL: &str = "door_opened_initial";
/// Notification event name for a session end.
pub const EVENT_DOOR_SESSION_ENDED: &str = "door_session_ended";
/// Notification event name for an intermediate pickup open.
pub const EVENT_DOOR_PICKUP: &str = "door_pickup";

/// What happened to a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorEventType {
    /// The door was bound to a user.
    Assigned,
    /// The door was opened.
    Opened,
    /// The door was closed.
    Closed,
    /// The door was locked.
    Locked,
    /// The door was unlocked.
    Unlocked,
}

impl DoorEventType {
    /// Returns the wire name of the event type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

impl From<DoorAction> for DoorEventType {
    fn from(action: DoorAction) -> Self {
        match action {
            DoorAction::Opened => Self::Opened,
            DoorAction::Closed => Self::Closed,
            DoorAction::Locked => Self::Locked,
            DoorAction::Unlocked => Self::Unlocked,
        }
    }
}

/// The request path an event came from, e.g. `"apk"` or `"kiosk"`.
///
/// Compound sources record which flow touched the door:
/// `apk_initial_access`, `apk_end_session`, `apk_pickup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventSource(String);

impl EventSource {
    /// Wraps a raw source tag.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// Returns the source as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a flow-specific source, `"<source>_<suffix>"`.
    #[must_use]
    pub fn suffixed(&self, suffix: &str) -> Self {
        Self(format!("{}_{suffix}", self.0))
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventSource {
    fn from(source: &str) -> Self {
        Self(source.to_string())
    }
}

/// One row of the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorEvent {
    /// The door the event happened on.
    pub door_id: DoorId,
    /// The acting user, when the request carried one.
    pub user_id: Option<UserId>,
    /// What happened.
    pub event_type: DoorEventType,
    /// Which flow recorded it.
    pub source: EventSource,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// A fire-and-forget change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// The pub/sub topic, shared by all locker notifications.
    pub topic: String,
    /// The event name, one of the `EVENT_*` constants.
    pub event: String,
    /// Event-specific payload.
    pub payload: serde_json::Value,
}
