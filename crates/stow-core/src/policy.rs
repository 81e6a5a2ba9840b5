//! Auth policy resolution: which credential methods a client requires.
//!
//! Each client organization provisions one locker-settings row and binds a
//! set of auth methods to it. The resolver reads both and filters the
//! bindings to methods that are still active in the global catalog. A
//! client with no settings row is a hard precondition failure, not a
//! default-open policy.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{SettingsStore, StoreError};
use crate::types::{ClientId, SettingId};

/// An auth method a client can require for door actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredMethod {
    /// The user must present their access code.
    AccessCode,
    /// The user must pass a biometric check (card tap or face match).
    Biometric,
}

impl RequiredMethod {
    /// Returns the catalog's technical name for the method.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessCode => "access_code",
            Self::Biometric => "biometric",
        }
    }
}

/// A client's locker-settings row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLockerSettings {
    /// The settings row id, referenced by auth-method bindings.
    pub id: SettingId,
    /// The owning client.
    pub client_id: ClientId,
    /// Whether users may assign doors to themselves.
    pub allow_user_assignment: bool,
}

/// One auth method bound to a settings row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMethodBinding {
    /// The bound method.
    pub method: RequiredMethod,
    /// Whether the method is active in the global catalog. Inactive catalog
    /// entries are ignored even when bound.
    pub catalog_active: bool,
}

/// The set of methods a client requires before granting a door action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredMethods {
    methods: BTreeSet<RequiredMethod>,
}

impl RequiredMethods {
    /// Builds the set from resolved bindings.
    #[must_use]
    pub fn from_iter(methods: impl IntoIterator<Item = RequiredMethod>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }

    /// Returns `true` if the client gates door actions behind an access
    /// code.
    #[must_use]
    pub fn access_code(&self) -> bool {
        self.methods.contains(&RequiredMethod::AccessCode)
    }

    /// Returns `true` if the client requires a biometric factor.
    ///
    /// Biometric gating is enforced at the device, not by the engine; the
    /// flag is surfaced so clients of the engine can prompt accordingly.
    #[must_use]
    pub fn biometric(&self) -> bool {
        self.methods.contains(&RequiredMethod::Biometric)
    }

    /// Iterates the required methods in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = RequiredMethod> + '_ {
        self.methods.iter().copied()
    }

    /// Returns `true` when nothing is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Failure of policy resolution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// The client has no locker-settings row.
    #[error("client locker settings not found for {client_id}")]
    SettingsNotFound {
        /// The client without settings.
        client_id: ClientId,
    },

    /// The settings store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves a client's required auth methods and assignment policy.
pub struct Resolver {
    settings: Arc<dyn SettingsStore>,
}

impl Resolver {
    /// Creates a resolver over the given settings store.
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Returns the client's locker settings.
    ///
    /// # Errors
    ///
    /// [`PolicyError::SettingsNotFound`] if the client was never
    /// provisioned.
    pub fn settings(&self, client_id: &ClientId) -> Result<ClientLockerSettings, PolicyError> {
        self.settings
            .locker_settings(client_id)?
            .ok_or_else(|| PolicyError::SettingsNotFound {
                client_id: client_id.clone(),
            })
    }

    /// Resolves the set of methods the client requires for door actions.
    pub fn required_methods(&self, client_id: &ClientId) -> Result<RequiredMethods, PolicyError> {
        let settings = self.settings(client_id)?;
        self.required_methods_for(&settings)
    }

    /// Like [`Resolver::required_methods`], for an already-loaded settings
    /// row.
    pub fn required_methods_for(
        &self,
        settings: &ClientLockerSettings,
    ) -> Result<RequiredMethods, PolicyError> {
        let bindings = self.settings.auth_method_bindings(&settings.id)?;
        Ok(RequiredMethods::from_iter(
            bindings
                .into_iter()
                .filter(|b| b.catalog_active)
                .map(|b| b.method),
        ))
    }
}
