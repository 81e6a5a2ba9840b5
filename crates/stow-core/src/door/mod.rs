//! Door lifecycle: status, actions, and the state machine.
//!
//! A [`LockerDoor`] is the one shared mutable resource in the engine. Every
//! mutation flows through [`DoorStateMachine::apply`] or the assignment
//! engine, both of which write through the store's conditional update so two
//! racing requests cannot both win.
//!
//! # State machine
//!
//! ```text
//! available --opened--> occupied
//! occupied  --closed--> available
//! *         --locked--> locked
//! locked    --unlocked--> available
//! ```
//!
//! The action→status table lives in one place, [`next_status`], shared by the
//! plain control path and the auto-assignment path.

mod machine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use machine::{DoorStateMachine, Transition};

use crate::error::EngineError;
use crate::types::{ClientId, DoorId, UserId};

/// Lifecycle status of a locker door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorStatus {
    /// Free for assignment.
    Available,
    /// Bound to a user.
    Occupied,
    /// Locked shut.
    Locked,
    /// Bound to a user past the allowed occupancy window.
    Overdue,
}

impl DoorStatus {
    /// Returns the canonical wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Locked => "locked",
            Self::Overdue => "overdue",
        }
    }

    /// Parses a stored status string.
    ///
    /// `"in_use"` is accepted as an alias of `occupied`: older door rows were
    /// written with either spelling depending on the call path.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(Self::Available),
            "occupied" | "in_use" => Some(Self::Occupied),
            "locked" => Some(Self::Locked),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    /// Returns `true` if a user is expected to be bound to the door.
    ///
    /// This is the status half of the occupancy invariant: a door carries an
    /// `assigned_user_id` exactly when this returns `true`.
    #[must_use]
    pub fn is_held(self) -> bool {
        matches!(self, Self::Occupied | Self::Locked | Self::Overdue)
    }
}

impl std::fmt::Display for DoorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A door action requested by a client device or app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorAction {
    /// The door was opened.
    Opened,
    /// The door was closed.
    Closed,
    /// The door was locked.
    Locked,
    /// The door was unlocked.
    Unlocked,
}

impl DoorAction {
    /// Returns the wire name of the action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }

    /// Parses an inbound `action_type`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidAction`] for anything outside the four
    /// known actions. Rejection happens before any side effect.
    pub fn parse(value: &str) -> Result<Self, EngineError> {
        match value {
            "opened" => Ok(Self::Opened),
            "closed" => Ok(Self::Closed),
            "locked" => Ok(Self::Locked),
            "unlocked" => Ok(Self::Unlocked),
            other => Err(EngineError::InvalidAction {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DoorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action→status transition table.
///
/// Both control paths (explicit door control and auto-assignment control)
/// share this function; there is deliberately no second copy of the table.
#[must_use]
pub fn next_status(action: DoorAction) -> DoorStatus {
    match action {
        DoorAction::Opened => DoorStatus::Occupied,
        DoorAction::Closed | DoorAction::Unlocked => DoorStatus::Available,
        DoorAction::Locked => DoorStatus::Locked,
    }
}

/// A single locker door row.
///
/// Created at provisioning time by the owning client organization; the engine
/// mutates status and assignment but never creates or deletes doors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerDoor {
    /// The door's identifier.
    pub id: DoorId,
    /// The client organization that owns the door.
    pub client_id: ClientId,
    /// Human-facing door number within the locker bank.
    pub door_number: u32,
    /// Current lifecycle status.
    pub status: DoorStatus,
    /// The user currently holding the door, if any.
    pub assigned_user_id: Option<UserId>,
    /// When the current holder was assigned.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Last time the door physically opened.
    pub last_opened_at: Option<DateTime<Utc>>,
}

impl LockerDoor {
    /// Creates an available, unassigned door.
    #[must_use]
    pub fn available(id: DoorId, client_id: ClientId, door_number: u32) -> Self {
        Self {
            id,
            client_id,
            door_number,
            status: DoorStatus::Available,
            assigned_user_id: None,
            assigned_at: None,
            last_opened_at: None,
        }
    }

    /// Checks the occupancy invariant: a holder is recorded exactly when the
    /// status says the door is held.
    #[must_use]
    pub fn assignment_consistent(&self) -> bool {
        self.status.is_held() == self.assigned_user_id.is_some()
    }
}
