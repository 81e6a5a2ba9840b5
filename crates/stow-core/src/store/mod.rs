//! Collaborator interfaces consumed by the engine.
//!
//! The engine never talks to a database or message broker directly; it goes
//! through these narrow traits. The in-memory implementations in
//! [`memory`] back the test suite and small single-process deployments.
//!
//! The one write that matters for correctness is
//! [`DoorStore::update_if_status`]: a door row may only move to a new state
//! if it is still in the state the caller read. Implementations must check
//! and apply as one atomic step (a conditional `UPDATE ... WHERE status IN`
//! for SQL backends, a single write-lock section for the in-memory store).

mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::{
    FirstAvailableSelector, MemoryCredentialStore, MemoryDoorStore, MemorySessionStore,
    MemorySettingsStore, MemoryUserStore,
};

use crate::credential::{Credential, MethodType};
use crate::door::{DoorStatus, LockerDoor};
use crate::policy::{AuthMethodBinding, ClientLockerSettings};
use crate::session::LockerSession;
use crate::types::{ClientId, DoorId, SettingId, UserId};

/// Failure of a storage round trip.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of row ("door", "session", ...).
        entity: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// A conditional door update lost its race: the row is no longer in any
    /// of the expected states.
    #[error("door {door_id} status changed, now {current}")]
    StatusChanged {
        /// The contested door.
        door_id: DoorId,
        /// The status the row actually holds.
        current: DoorStatus,
    },

    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// How a door update treats the assignment columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentChange {
    /// Leave `assigned_user_id` / `assigned_at` untouched.
    Keep,
    /// Bind the door to a user.
    Set {
        /// The new holder.
        user_id: UserId,
        /// Assignment timestamp.
        assigned_at: DateTime<Utc>,
    },
    /// Clear the assignment.
    Clear,
}

/// A door row mutation, applied only if the status precondition holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorUpdate {
    /// New status, if the status changes.
    pub status: Option<DoorStatus>,
    /// Assignment column treatment.
    pub assignment: AssignmentChange,
    /// New `last_opened_at`, if the door opened.
    pub last_opened_at: Option<DateTime<Utc>>,
}

impl DoorUpdate {
    /// An update that only moves the status.
    #[must_use]
    pub fn status(status: DoorStatus) -> Self {
        Self {
            status: Some(status),
            assignment: AssignmentChange::Keep,
            last_opened_at: None,
        }
    }

    /// An update that touches nothing but `last_opened_at`.
    #[must_use]
    pub fn touch_opened(at: DateTime<Utc>) -> Self {
        Self {
            status: None,
            assignment: AssignmentChange::Keep,
            last_opened_at: Some(at),
        }
    }

    /// Sets the assignment columns.
    #[must_use]
    pub fn assign_to(mut self, user_id: UserId, assigned_at: DateTime<Utc>) -> Self {
        self.assignment = AssignmentChange::Set {
            user_id,
            assigned_at,
        };
        self
    }

    /// Clears the assignment columns.
    #[must_use]
    pub fn clear_assignment(mut self) -> Self {
        self.assignment = AssignmentChange::Clear;
        self
    }

    /// Stamps `last_opened_at`.
    #[must_use]
    pub fn opened_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_opened_at = Some(at);
        self
    }
}

/// Point lookups and conditional writes on door rows.
pub trait DoorStore: Send + Sync {
    /// Fetches a door by id.
    fn get(&self, id: &DoorId) -> Result<Option<LockerDoor>, StoreError>;

    /// Lists all doors owned by a client, ordered by door number.
    fn list_by_client(&self, client_id: &ClientId) -> Result<Vec<LockerDoor>, StoreError>;

    /// Applies `update` to the door only if its current status is one of
    /// `expected`, returning the updated row.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the door does not exist
    /// - [`StoreError::StatusChanged`] if the precondition no longer holds
    fn update_if_status(
        &self,
        id: &DoorId,
        expected: &[DoorStatus],
        update: DoorUpdate,
    ) -> Result<LockerDoor, StoreError>;
}

/// Session bookkeeping.
pub trait SessionStore: Send + Sync {
    /// Inserts a freshly opened session.
    fn insert(&self, session: LockerSession) -> Result<(), StoreError>;

    /// Returns the active session on a door, if any.
    fn active_for_door(&self, door_id: &DoorId) -> Result<Option<LockerSession>, StoreError>;

    /// Completes the active session matching `(door, user)`, stamping
    /// `end_time`. Returns `false` if no such session exists.
    fn complete_active(
        &self,
        door_id: &DoorId,
        user_id: &UserId,
        end_time: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// Credential rows, read-mostly.
pub trait CredentialStore: Send + Sync {
    /// Returns the newest credential for `(user, method)`, active or not.
    fn current_for_user(
        &self,
        user_id: &UserId,
        method: MethodType,
    ) -> Result<Option<Credential>, StoreError>;

    /// Finds a credential by its exact stored value.
    fn find_by_value(
        &self,
        stored_value: &str,
        method: MethodType,
    ) -> Result<Option<Credential>, StoreError>;

    /// Lists all active credentials for a method.
    fn list_active(&self, method: MethodType) -> Result<Vec<Credential>, StoreError>;

    /// Retires the active credential for `(user, method)` and inserts the
    /// replacement as one transactional unit.
    fn replace_active(&self, credential: Credential) -> Result<(), StoreError>;
}

/// Client locker settings and the auth-method catalog, read-only here.
pub trait SettingsStore: Send + Sync {
    /// Returns the client's locker-settings row, if provisioned.
    fn locker_settings(
        &self,
        client_id: &ClientId,
    ) -> Result<Option<ClientLockerSettings>, StoreError>;

    /// Returns the auth methods bound to a settings row, with their
    /// catalog activity flag.
    fn auth_method_bindings(
        &self,
        setting_id: &SettingId,
    ) -> Result<Vec<AuthMethodBinding>, StoreError>;
}

/// User lookups, read-only here.
pub trait UserStore: Send + Sync {
    /// Fetches a user by id.
    fn get(&self, id: &UserId) -> Result<Option<crate::types::User>, StoreError>;
}

/// Insert-only audit log for door events.
pub trait EventSink: Send + Sync {
    /// Appends one event. The emitter treats failures as best-effort.
    fn append(&self, event: &crate::events::DoorEvent) -> Result<(), StoreError>;
}

/// Failure of the door-selection procedure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectionError {
    /// No eligible door exists for the user.
    #[error("no locker door available for user {user_id}")]
    NoDoorAvailable {
        /// The user that could not be placed.
        user_id: UserId,
    },

    /// The selection backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The opaque door-selection procedure used by auto-assignment.
///
/// Given a user with no explicit door choice, returns one door the user is
/// eligible for. The reference deployment implements this as a stored
/// procedure; [`FirstAvailableSelector`] is the embedded fallback.
pub trait DoorSelector: Send + Sync {
    /// Picks a door for the user.
    fn select_for_user(&self, user_id: &UserId) -> Result<DoorId, SelectionError>;
}
