//! Engine-wide error taxonomy.
//!
//! Every operation on [`crate::engine::LockerEngine`] surfaces an
//! [`EngineError`]. The variant names follow the request surface; callers
//! that speak a transport protocol map [`EngineError::kind`] to a status
//! code and forward the display message as-is.
//!
//! Secondary bookkeeping failures (audit append, notification publish, the
//! optional session touch-ups) never appear here: they are logged at the
//! call site and swallowed so the primary state change still reports
//! success.

use thiserror::Error;

use crate::credential::{CredentialError, MethodType};
use crate::door::DoorStatus;
use crate::policy::PolicyError;
use crate::store::{SelectionError, StoreError};
use crate::types::{ClientId, DoorId, UserId};

/// Coarse classification of an [`EngineError`].
///
/// Maps one-to-one onto the transport status families used by the reference
/// deployment (400 / 404 / 401-403 / 409 / 500).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, rejected before any side effect.
    Validation,
    /// A referenced door, user, or settings row does not exist.
    NotFound,
    /// The caller is not allowed to perform the action.
    Authorization,
    /// The target is not in the required precondition state.
    Conflict,
    /// A required storage or collaborator step failed.
    Internal,
}

/// Failure of an engine operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The requested `action_type` is not one of the four door actions.
    #[error("invalid action_type: {value}")]
    InvalidAction {
        /// The rejected value.
        value: String,
    },

    /// The door does not exist.
    #[error("locker door not found: {door_id}")]
    DoorNotFound {
        /// The missing door.
        door_id: DoorId,
    },

    /// The door is not available for assignment.
    #[error("locker door {door_id} is not available for assignment (status: {status})")]
    DoorUnavailable {
        /// The contested door.
        door_id: DoorId,
        /// Its status at the time of the check.
        status: DoorStatus,
    },

    /// The door changed state underneath a control request.
    #[error("locker door {door_id} changed state during the request (now {current})")]
    StateChanged {
        /// The door.
        door_id: DoorId,
        /// The status observed by the conditional update.
        current: DoorStatus,
    },

    /// The door is not currently occupied or overdue.
    #[error("locker door {door_id} is not currently occupied (status: {status})")]
    NotOccupied {
        /// The door.
        door_id: DoorId,
        /// Its actual status.
        status: DoorStatus,
    },

    /// The door is assigned to a different user.
    #[error("user {user_id} is not the holder of locker door {door_id}")]
    Unauthorized {
        /// The door.
        door_id: DoorId,
        /// The caller.
        user_id: UserId,
    },

    /// The client's settings forbid user self-assignment.
    #[error("client {client_id} does not allow user assignment")]
    AssignmentNotAllowed {
        /// The owning client.
        client_id: ClientId,
    },

    /// The user does not exist.
    #[error("user not found: {user_id}")]
    UserNotFound {
        /// The missing user.
        user_id: UserId,
    },

    /// The user's account is deactivated.
    #[error("user account is not active: {user_id}")]
    UserInactive {
        /// The inactive user.
        user_id: UserId,
    },

    /// The client has no locker-settings row.
    #[error("client locker settings not found for {client_id}")]
    SettingsNotFound {
        /// The client without settings.
        client_id: ClientId,
    },

    /// The door-selection procedure found no eligible door.
    #[error("no locker door available for user {user_id}")]
    NoDoorAvailable {
        /// The user that could not be placed.
        user_id: UserId,
    },

    /// The client requires an access code and none was supplied.
    #[error("access code required")]
    AccessCodeRequired,

    /// The user has no access code on file.
    #[error("no access code found for user {user_id}")]
    AccessCodeNotRegistered {
        /// The user without a code.
        user_id: UserId,
    },

    /// The user's access code is deactivated.
    #[error("access code is not active for user {user_id}")]
    AccessCodeInactive {
        /// The user with the retired code.
        user_id: UserId,
    },

    /// The supplied access code does not match any credential.
    #[error("invalid access code")]
    InvalidAccessCode,

    /// The card UID does not look like a card UID.
    #[error("invalid card data: card UID must be a 4-20 character hex string")]
    InvalidCardUid,

    /// An empty access code was submitted for registration.
    #[error("access code must not be empty")]
    EmptyAccessCode,

    /// The card has never been registered.
    #[error("card not registered")]
    CardNotRegistered,

    /// The card exists but is deactivated.
    #[error("card deactivated")]
    CardDeactivated,

    /// The card is already bound to a different user.
    #[error("card already registered to another user")]
    CardBoundToOtherUser,

    /// The face template hash is empty or malformed.
    #[error("invalid face template hash")]
    InvalidFaceTemplate,

    /// The user has no registered face template.
    #[error("no registered face found for user {user_id}")]
    FaceNotRegistered {
        /// The user without a template.
        user_id: UserId,
    },

    /// A required storage step failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Classifies the error into the transport-facing taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAction { .. }
            | Self::InvalidCardUid
            | Self::InvalidFaceTemplate
            | Self::EmptyAccessCode => ErrorKind::Validation,
            Self::DoorNotFound { .. }
            | Self::UserNotFound { .. }
            | Self::SettingsNotFound { .. }
            | Self::CardNotRegistered
            | Self::FaceNotRegistered { .. }
            | Self::NoDoorAvailable { .. } => ErrorKind::NotFound,
            Self::Unauthorized { .. }
            | Self::UserInactive { .. }
            | Self::AssignmentNotAllowed { .. }
            | Self::AccessCodeRequired
            | Self::AccessCodeNotRegistered { .. }
            | Self::AccessCodeInactive { .. }
            | Self::InvalidAccessCode
            | Self::CardDeactivated => ErrorKind::Authorization,
            Self::DoorUnavailable { .. }
            | Self::StateChanged { .. }
            | Self::NotOccupied { .. }
            | Self::CardBoundToOtherUser => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<PolicyError> for EngineError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::SettingsNotFound { client_id } => Self::SettingsNotFound { client_id },
            PolicyError::Store(err) => Self::Store(err),
        }
    }
}

impl From<CredentialError> for EngineError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound { user_id, method } => match method {
                MethodType::Code => Self::AccessCodeNotRegistered { user_id },
                MethodType::Card => Self::CardNotRegistered,
                MethodType::Face => Self::FaceNotRegistered { user_id },
            },
            CredentialError::Inactive { user_id, method } => match method {
                MethodType::Card => Self::CardDeactivated,
                MethodType::Code | MethodType::Face => Self::AccessCodeInactive { user_id },
            },
            CredentialError::Mismatch | CredentialError::NoMatch => Self::InvalidAccessCode,
            CredentialError::InvalidCardUid => Self::InvalidCardUid,
            CredentialError::InvalidFaceTemplate => Self::InvalidFaceTemplate,
            CredentialError::EmptyAccessCode => Self::EmptyAccessCode,
            CredentialError::CardNotRegistered => Self::CardNotRegistered,
            CredentialError::CardDeactivated => Self::CardDeactivated,
            CredentialError::BoundToOtherUser { .. } => Self::CardBoundToOtherUser,
            CredentialError::UserNotFound { user_id } => Self::UserNotFound { user_id },
            CredentialError::UserInactive { user_id } => Self::UserInactive { user_id },
            CredentialError::Hash(msg) => Self::Store(StoreError::Backend(msg)),
            CredentialError::Store(err) => Self::Store(err),
        }
    }
}

impl From<SelectionError> for EngineError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::NoDoorAvailable { user_id } => Self::NoDoorAvailable { user_id },
            SelectionError::Store(err) => Self::Store(err),
        }
    }
}
