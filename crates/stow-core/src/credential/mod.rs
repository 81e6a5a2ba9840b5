//! Credentials: stored secrets, verification, and registration.
//!
//! A credential binds a user to one authentication method. The engine keeps
//! at most one active credential per `(user, method)`; registering a new one
//! retires the previous through a single atomic store call.
//!
//! # Stored formats
//!
//! Access codes exist in two on-disk formats, distinguished by a prefix
//! sniff at load time:
//!
//! - `$2b$` / `$2a$` — bcrypt salted hash, the current format
//! - anything else — legacy plaintext, kept for migration compatibility
//!
//! The legacy path is isolated in [`StoredSecret::Legacy`] so it can be
//! retired without touching call sites. Every legacy comparison is flagged
//! through `tracing::warn!`.

mod registrar;
mod verifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

pub use registrar::Registrar;
pub use verifier::{FaceVerification, VerifiedUser, Verifier};

use crate::store::StoreError;
use crate::types::UserId;

/// Authentication method a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodType {
    /// Numeric or alphanumeric access code.
    Code,
    /// NFC/RFID card UID.
    Card,
    /// Face template hash produced by an external recognition stage.
    Face,
}

impl MethodType {
    /// Returns the wire name of the method.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Card => "card",
            Self::Face => "face",
        }
    }
}

impl std::fmt::Display for MethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored credential secret, tagged by format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredSecret {
    /// bcrypt salted hash.
    Hashed(String),
    /// Legacy plaintext value (or an opaque digest for card/face rows).
    Legacy(String),
}

impl StoredSecret {
    /// Classifies a stored value by its bcrypt prefix.
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.starts_with("$2b$") || value.starts_with("$2a$") {
            Self::Hashed(value)
        } else {
            Self::Legacy(value)
        }
    }

    /// Returns the raw stored value.
    #[must_use]
    pub fn stored_value(&self) -> &str {
        match self {
            Self::Hashed(v) | Self::Legacy(v) => v,
        }
    }

    /// Returns `true` for the plaintext migration format.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Compares a supplied access code against the stored secret.
    ///
    /// Hashed secrets go through bcrypt; legacy secrets through a
    /// constant-time equality check. An undecodable hash compares unequal
    /// rather than erroring, so verification stays deterministic.
    #[must_use]
    pub fn matches_code(&self, supplied: &str) -> bool {
        match self {
            Self::Hashed(hash) => bcrypt::verify(supplied, hash).unwrap_or(false),
            Self::Legacy(plain) => constant_time_str_eq(plain, supplied),
        }
    }
}

/// An active or retired credential row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The owning user.
    pub user_id: UserId,
    /// The method this credential authenticates.
    pub method: MethodType,
    /// The stored secret, format-tagged.
    pub secret: StoredSecret,
    /// Retired credentials stay on file but never verify.
    pub is_active: bool,
    /// When the credential was registered.
    pub registered_at: DateTime<Utc>,
}

impl Credential {
    /// Creates an active credential from a stored value.
    #[must_use]
    pub fn active(
        user_id: UserId,
        method: MethodType,
        stored_value: impl Into<String>,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            method,
            secret: StoredSecret::from_stored(stored_value),
            is_active: true,
            registered_at,
        }
    }
}

/// Digest of a card UID as stored and compared.
///
/// The raw UID never reaches storage: it is trimmed, lowercased, and pushed
/// through SHA-256, matching what the registration path wrote.
#[must_use]
pub fn hash_card_uid(card_uid: &str) -> String {
    let normalized = card_uid.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

/// Checks that a card UID looks like reader output: 4-20 hex characters.
#[must_use]
pub fn is_valid_card_uid(card_uid: &str) -> bool {
    let trimmed = card_uid.trim();
    (4..=20).contains(&trimmed.len()) && trimmed.chars().all(|c| c.is_ascii_hexdigit())
}

/// Constant-time string equality; unequal lengths compare unequal.
pub(crate) fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Failure of a credential operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// No credential on file for the user and method.
    #[error("no {method} credential found for user {user_id}")]
    NotFound {
        /// The user without a credential.
        user_id: UserId,
        /// The method looked up.
        method: MethodType,
    },

    /// The credential on file is retired.
    #[error("{method} credential is not active for user {user_id}")]
    Inactive {
        /// The user with the retired credential.
        user_id: UserId,
        /// The method looked up.
        method: MethodType,
    },

    /// The supplied value does not match the stored credential.
    #[error("credential does not match")]
    Mismatch,

    /// The global access-code scan found no matching credential.
    #[error("invalid access code")]
    NoMatch,

    /// The card UID is not a 4-20 character hex string.
    #[error("invalid card data: card UID must be a 4-20 character hex string")]
    InvalidCardUid,

    /// The face template hash is empty.
    #[error("invalid face template hash")]
    InvalidFaceTemplate,

    /// The access code to register is empty.
    #[error("access code must not be empty")]
    EmptyAccessCode,

    /// The card was never registered.
    #[error("card not registered")]
    CardNotRegistered,

    /// The card is on file but deactivated.
    #[error("card deactivated")]
    CardDeactivated,

    /// The credential is already bound to a different user.
    #[error("credential already registered to user {user_id}")]
    BoundToOtherUser {
        /// The current owner.
        user_id: UserId,
    },

    /// The user the credential should bind to does not exist.
    #[error("user not found: {user_id}")]
    UserNotFound {
        /// The missing user.
        user_id: UserId,
    },

    /// The user bound to the credential is deactivated.
    #[error("user account is not active: {user_id}")]
    UserInactive {
        /// The inactive user.
        user_id: UserId,
    },

    /// Hashing the new credential failed.
    #[error("failed to hash credential: {0}")]
    Hash(String),

    /// The credential store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
