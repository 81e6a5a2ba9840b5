//! Locker sessions: the interval a door is bound to a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DoorId, UserId};

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The user currently holds the door.
    Active,
    /// The session ended.
    Completed,
}

/// A single door occupancy interval.
///
/// Sessions back-reference their door by id; the door row itself stays the
/// single source of truth for current occupancy. At most one session per
/// door is `Active` at any time, enforced by the assignment engine opening a
/// session only after it wins the door's conditional update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerSession {
    /// Session identifier.
    pub id: Uuid,
    /// The door this session occupies.
    pub locker_door_id: DoorId,
    /// The holding user.
    pub user_id: UserId,
    /// When the session opened.
    pub start_time: DateTime<Utc>,
    /// When the session closed, if it has.
    pub end_time: Option<DateTime<Utc>>,
    /// Current status.
    pub status: SessionStatus,
}

impl LockerSession {
    /// Opens a new active session.
    #[must_use]
    pub fn open(locker_door_id: DoorId, user_id: UserId, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            locker_door_id,
            user_id,
            start_time,
            end_time: None,
            status: SessionStatus::Active,
        }
    }

    /// Returns `true` while the session holds its door.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}
