//! Credential registration: binding secrets to users.

use std::sync::Arc;

use chrono::Utc;

use super::{hash_card_uid, is_valid_card_uid, Credential, CredentialError, MethodType};
use crate::store::{CredentialStore, UserStore};
use crate::types::UserId;

/// Registers credentials, retiring the previous one of the same method.
///
/// Every registration goes through [`CredentialStore::replace_active`], a
/// single transactional retire-and-insert, so the one-active-credential-per
/// `(user, method)` invariant cannot be broken by a crash between a delete
/// and an insert.
pub struct Registrar {
    credentials: Arc<dyn CredentialStore>,
    users: Arc<dyn UserStore>,
    bcrypt_cost: u32,
}

impl Registrar {
    /// Creates a registrar with the default bcrypt cost.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>, users: Arc<dyn UserStore>) -> Self {
        Self {
            credentials,
            users,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Overrides the bcrypt cost. Tests use a low cost to stay fast.
    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Registers a new access code for a user, hashed before storage.
    ///
    /// # Errors
    ///
    /// [`CredentialError::EmptyAccessCode`] for an empty code,
    /// [`CredentialError::Hash`] if hashing fails.
    pub fn register_access_code(
        &self,
        user_id: &UserId,
        access_code: &str,
    ) -> Result<(), CredentialError> {
        if access_code.trim().is_empty() {
            return Err(CredentialError::EmptyAccessCode);
        }
        let hash = bcrypt::hash(access_code, self.bcrypt_cost)
            .map_err(|err| CredentialError::Hash(err.to_string()))?;
        self.credentials.replace_active(Credential::active(
            user_id.clone(),
            MethodType::Code,
            hash,
            Utc::now(),
        ))?;
        tracing::info!(user_id = %user_id, "access code registered");
        Ok(())
    }

    /// Registers a card UID to a user.
    ///
    /// The raw UID is digested before storage; the store never sees it.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InvalidCardUid`] — malformed UID
    /// - [`CredentialError::UserNotFound`] — unknown user
    /// - [`CredentialError::BoundToOtherUser`] — the card is actively bound
    ///   to someone else
    pub fn register_card(&self, user_id: &UserId, card_data: &str) -> Result<(), CredentialError> {
        if !is_valid_card_uid(card_data) {
            return Err(CredentialError::InvalidCardUid);
        }
        let card_hash = hash_card_uid(card_data);

        let user = self
            .users
            .get(user_id)?
            .ok_or_else(|| CredentialError::UserNotFound {
                user_id: user_id.clone(),
            })?;

        if let Some(existing) = self.credentials.find_by_value(&card_hash, MethodType::Card)? {
            if existing.is_active && existing.user_id != *user_id {
                return Err(CredentialError::BoundToOtherUser {
                    user_id: existing.user_id,
                });
            }
        }

        self.credentials.replace_active(Credential::active(
            user_id.clone(),
            MethodType::Card,
            card_hash,
            Utc::now(),
        ))?;
        tracing::info!(
            user_id = %user_id,
            client_id = %user.client_id,
            "card registered via reader tap"
        );
        Ok(())
    }

    /// Registers (or replaces) a user's face template hash.
    pub fn register_face(
        &self,
        user_id: &UserId,
        template_hash: &str,
    ) -> Result<(), CredentialError> {
        if template_hash.trim().is_empty() {
            return Err(CredentialError::InvalidFaceTemplate);
        }
        self.credentials.replace_active(Credential::active(
            user_id.clone(),
            MethodType::Face,
            template_hash,
            Utc::now(),
        ))?;
        tracing::info!(user_id = %user_id, "face template registered");
        Ok(())
    }
}
