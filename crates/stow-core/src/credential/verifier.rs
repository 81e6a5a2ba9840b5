//! Credential verification against stored secrets.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    constant_time_str_eq, hash_card_uid, is_valid_card_uid, CredentialError, MethodType,
    StoredSecret,
};
use crate::store::{CredentialStore, UserStore};
use crate::types::{ClientId, UserId};

/// The user resolved by a successful card verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUser {
    /// The card holder.
    pub user_id: UserId,
    /// Display name for the device UI.
    pub full_name: String,
    /// The holder's client organization.
    pub client_id: ClientId,
}

/// Result of a face comparison.
///
/// A non-matching template is a *result*, not an error: the device shows
/// "face does not match" and lets the user retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceVerification {
    /// The user the template was compared for.
    pub user_id: UserId,
    /// Whether the supplied template hash matched the stored one.
    pub verified: bool,
}

/// Verifies supplied credential material against stored credentials.
///
/// All checks are read-only, deterministic, and idempotent: the same input
/// against the same stored state always produces the same answer.
pub struct Verifier {
    credentials: Arc<dyn CredentialStore>,
    users: Arc<dyn UserStore>,
}

impl Verifier {
    /// Creates a verifier over the given stores.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>, users: Arc<dyn UserStore>) -> Self {
        Self { credentials, users }
    }

    /// Verifies supplied material for a known user and method.
    ///
    /// For `Code` the supplied value is the access code, for `Card` the raw
    /// card UID, for `Face` the precomputed template hash.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::NotFound`] — nothing on file for the pair
    /// - [`CredentialError::Inactive`] — the credential is retired
    /// - [`CredentialError::Mismatch`] — the material does not match
    pub fn verify(
        &self,
        method: MethodType,
        user_id: &UserId,
        supplied: &str,
    ) -> Result<(), CredentialError> {
        let credential = self
            .credentials
            .current_for_user(user_id, method)?
            .ok_or_else(|| CredentialError::NotFound {
                user_id: user_id.clone(),
                method,
            })?;
        if !credential.is_active {
            return Err(CredentialError::Inactive {
                user_id: user_id.clone(),
                method,
            });
        }

        let matches = match method {
            MethodType::Code => {
                if credential.secret.is_legacy() {
                    tracing::warn!(
                        user_id = %user_id,
                        "comparing against legacy plaintext access code; migration pending"
                    );
                }
                credential.secret.matches_code(supplied)
            },
            MethodType::Card => {
                if !is_valid_card_uid(supplied) {
                    return Err(CredentialError::InvalidCardUid);
                }
                constant_time_str_eq(credential.secret.stored_value(), &hash_card_uid(supplied))
            },
            MethodType::Face => {
                constant_time_str_eq(credential.secret.stored_value(), supplied)
            },
        };

        if matches {
            Ok(())
        } else {
            Err(CredentialError::Mismatch)
        }
    }

    /// Resolves an access code to its owner without any user context.
    ///
    /// Two passes, first match wins:
    ///
    /// 1. exact stored-value lookup, which catches legacy plaintext rows in
    ///    one indexed read;
    /// 2. a linear bcrypt scan over every active hashed `code` credential.
    ///
    /// The scan is O(n) in the number of code credentials by design; there
    /// is no user context to narrow it. Revisit with an indexed derived key
    /// if credential volume grows.
    pub fn validate_access_code(&self, access_code: &str) -> Result<UserId, CredentialError> {
        if let Some(credential) = self
            .credentials
            .find_by_value(access_code, MethodType::Code)?
        {
            if credential.is_active {
                if credential.secret.is_legacy() {
                    tracing::warn!(
                        user_id = %credential.user_id,
                        "access code matched a legacy plaintext credential; migration pending"
                    );
                }
                return Ok(credential.user_id);
            }
        }

        for credential in self.credentials.list_active(MethodType::Code)? {
            if let StoredSecret::Hashed(_) = credential.secret {
                if credential.secret.matches_code(access_code) {
                    return Ok(credential.user_id);
                }
            }
        }

        Err(CredentialError::NoMatch)
    }

    /// Verifies a card tap and resolves the holder.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InvalidCardUid`] — malformed UID, rejected
    ///   before any lookup
    /// - [`CredentialError::CardNotRegistered`] — unknown card
    /// - [`CredentialError::CardDeactivated`] — the card was retired
    /// - [`CredentialError::UserNotFound`] / [`CredentialError::UserInactive`]
    ///   — the holder's account is gone or disabled
    pub fn verify_card(&self, card_data: &str) -> Result<VerifiedUser, CredentialError> {
        if !is_valid_card_uid(card_data) {
            return Err(CredentialError::InvalidCardUid);
        }
        let card_hash = hash_card_uid(card_data);

        let credential = self
            .credentials
            .find_by_value(&card_hash, MethodType::Card)?
            .ok_or(CredentialError::CardNotRegistered)?;
        if !credential.is_active {
            return Err(CredentialError::CardDeactivated);
        }

        let user = self
            .users
            .get(&credential.user_id)?
            .ok_or_else(|| CredentialError::UserNotFound {
                user_id: credential.user_id.clone(),
            })?;
        if !user.is_active {
            return Err(CredentialError::UserInactive { user_id: user.id });
        }

        Ok(VerifiedUser {
            user_id: user.id,
            full_name: user.full_name,
            client_id: user.client_id,
        })
    }

    /// Compares a face template hash for a user.
    ///
    /// The engine does no image processing: the hash comes from an external
    /// recognition stage and is compared as an opaque string.
    pub fn verify_face(
        &self,
        user_id: &UserId,
        template_hash: &str,
    ) -> Result<FaceVerification, CredentialError> {
        if template_hash.trim().is_empty() {
            return Err(CredentialError::InvalidFaceTemplate);
        }

        let credential = self
            .credentials
            .current_for_user(user_id, MethodType::Face)?
            .ok_or_else(|| CredentialError::NotFound {
                user_id: user_id.clone(),
                method: MethodType::Face,
            })?;
        if !credential.is_active {
            return Err(CredentialError::Inactive {
                user_id: user_id.clone(),
                method: MethodType::Face,
            });
        }

        Ok(FaceVerification {
            user_id: user_id.clone(),
            verified: constant_time_str_eq(credential.secret.stored_value(), template_hash),
        })
    }
}
