//! The engine facade: one value wiring every component.
//!
//! [`LockerEngine`] owns the full operation table. Embedders construct it
//! once from an [`EngineConfig`] and a set of collaborator stores, share it
//! behind an `Arc`, and call it from as many request threads as they like;
//! every operation is a short-lived synchronous unit of work.

use std::sync::Arc;

use crate::assignment::{AssignmentEngine, AssignmentReceipt, AutoAssignReceipt};
use crate::config::EngineConfig;
use crate::credential::{FaceVerification, Registrar, VerifiedUser, Verifier};
use crate::door::{DoorAction, DoorStateMachine, DoorStatus, LockerDoor, Transition};
use crate::error::EngineError;
use crate::events::{EventEmitter, EventSource, Notifier};
use crate::policy::Resolver;
use crate::store::{
    CredentialStore, DoorSelector, DoorStore, EventSink, SessionStore, SettingsStore, UserStore,
};
use crate::types::{ClientId, DoorId, UserId};

/// The collaborator stores the engine is wired over.
///
/// Production embeddings supply database-backed implementations; tests and
/// single-process deployments use the `Memory*` types from [`crate::store`].
pub struct EngineStores {
    /// Door rows.
    pub doors: Arc<dyn DoorStore>,
    /// Session bookkeeping.
    pub sessions: Arc<dyn SessionStore>,
    /// Credential rows.
    pub credentials: Arc<dyn CredentialStore>,
    /// Client settings and auth-method bindings.
    pub settings: Arc<dyn SettingsStore>,
    /// User lookups.
    pub users: Arc<dyn UserStore>,
    /// Door selection for auto-assignment.
    pub selector: Arc<dyn DoorSelector>,
    /// Audit event log.
    pub events: Arc<dyn EventSink>,
    /// Notification channel.
    pub notifier: Arc<dyn Notifier>,
}

/// The locker door access and assignment engine.
pub struct LockerEngine {
    doors: Arc<dyn DoorStore>,
    machine: Arc<DoorStateMachine>,
    assignment: AssignmentEngine,
    resolver: Arc<Resolver>,
    verifier: Arc<Verifier>,
    registrar: Registrar,
    default_source: EventSource,
}

impl LockerEngine {
    /// Wires an engine from configuration and collaborator stores.
    #[must_use]
    pub fn new(config: &EngineConfig, stores: EngineStores) -> Self {
        let emitter = Arc::new(EventEmitter::new(
            stores.events,
            stores.notifier,
            config.notification_topic.clone(),
            config.publish_timeout(),
        ));
        let resolver = Arc::new(Resolver::new(stores.settings));
        let verifier = Arc::new(Verifier::new(
            stores.credentials.clone(),
            stores.users.clone(),
        ));
        let registrar = Registrar::new(stores.credentials, stores.users.clone())
            .with_bcrypt_cost(config.bcrypt_cost);
        let machine = Arc::new(DoorStateMachine::new(
            stores.doors.clone(),
            stores.sessions.clone(),
            emitter.clone(),
        ));
        let assignment = AssignmentEngine::new(
            stores.doors.clone(),
            stores.sessions,
            stores.users,
            stores.selector,
            resolver.clone(),
            verifier.clone(),
            machine.clone(),
            emitter,
        );

        Self {
            doors: stores.doors,
            machine,
            assignment,
            resolver,
            verifier,
            registrar,
            default_source: EventSource::new(config.default_event_source.clone()),
        }
    }

    /// Applies a raw `action_type` to a door.
    ///
    /// The action string is validated before anything else; an unknown
    /// action produces no side effect of any kind. When the door's client
    /// requires an access code, the code is verified before the transition.
    pub fn control_door(
        &self,
        door_id: &DoorId,
        action: &str,
        user_id: &UserId,
        access_code: Option<&str>,
        source: Option<&str>,
    ) -> Result<Transition, EngineError> {
        let action = DoorAction::parse(action)?;
        let door = self
            .doors
            .get(door_id)?
            .ok_or_else(|| EngineError::DoorNotFound {
                door_id: door_id.clone(),
            })?;
        let required = self.resolver.required_methods(&door.client_id)?;
        crate::assignment::enforce_access_code(&self.verifier, &required, user_id, access_code)?;
        self.machine
            .apply(door_id, action, user_id, &self.source(source))
    }

    /// Assigns a user-selected available door to the user.
    pub fn assign_door(
        &self,
        door_id: &DoorId,
        user_id: &UserId,
        access_code: Option<&str>,
        source: Option<&str>,
    ) -> Result<AssignmentReceipt, EngineError> {
        self.assignment
            .assign(door_id, user_id, access_code, &self.source(source))
    }

    /// Auto-assigns a door and applies a raw `action_type` to it.
    pub fn auto_assign_and_control(
        &self,
        action: &str,
        user_id: &UserId,
        access_code: Option<&str>,
        source: Option<&str>,
    ) -> Result<AutoAssignReceipt, EngineError> {
        let action = DoorAction::parse(action)?;
        self.assignment
            .auto_assign_and_control(action, user_id, access_code, &self.source(source))
    }

    /// Ends the user's session on a door, returning the freed status.
    pub fn end_session(
        &self,
        door_id: &DoorId,
        user_id: &UserId,
        access_code: Option<&str>,
        source: Option<&str>,
    ) -> Result<DoorStatus, EngineError> {
        self.assignment
            .end_session(door_id, user_id, access_code, &self.source(source))
    }

    /// Opens the user's door for an intermediate pickup.
    pub fn pickup(
        &self,
        door_id: &DoorId,
        user_id: &UserId,
        access_code: Option<&str>,
        source: Option<&str>,
    ) -> Result<(), EngineError> {
        self.assignment
            .pickup(door_id, user_id, access_code, &self.source(source))
    }

    /// Resolves an access code to its owner without user context.
    pub fn validate_access_code(&self, access_code: &str) -> Result<UserId, EngineError> {
        if access_code.trim().is_empty() {
            return Err(EngineError::EmptyAccessCode);
        }
        Ok(self.verifier.validate_access_code(access_code)?)
    }

    /// Registers (or replaces) a user's access code.
    pub fn register_access_code(
        &self,
        user_id: &UserId,
        access_code: &str,
    ) -> Result<(), EngineError> {
        Ok(self.registrar.register_access_code(user_id, access_code)?)
    }

    /// Registers a card UID to a user.
    pub fn register_card(&self, user_id: &UserId, card_data: &str) -> Result<(), EngineError> {
        Ok(self.registrar.register_card(user_id, card_data)?)
    }

    /// Verifies a card tap and resolves the holder.
    pub fn verify_card(&self, card_data: &str) -> Result<VerifiedUser, EngineError> {
        Ok(self.verifier.verify_card(card_data)?)
    }

    /// Registers (or replaces) a user's face template hash.
    pub fn register_face(&self, user_id: &UserId, template_hash: &str) -> Result<(), EngineError> {
        Ok(self.registrar.register_face(user_id, template_hash)?)
    }

    /// Compares a face template hash for a user.
    ///
    /// A non-matching template is returned as `verified: false`, not an
    /// error.
    pub fn verify_face(
        &self,
        user_id: &UserId,
        template_hash: &str,
    ) -> Result<FaceVerification, EngineError> {
        Ok(self.verifier.verify_face(user_id, template_hash)?)
    }

    /// Returns the client's door roster with current assignments.
    ///
    /// A client with no doors gets an empty roster, not an error.
    pub fn occupancy(&self, client_id: &ClientId) -> Result<Vec<LockerDoor>, EngineError> {
        Ok(self.doors.list_by_client(client_id)?)
    }

    fn source(&self, source: Option<&str>) -> EventSource {
        source.map_or_else(|| self.default_source.clone(), EventSource::new)
    }
}
