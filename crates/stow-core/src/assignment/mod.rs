//! Door assignment: binding doors to users and releasing them.
//!
//! Two paths bind a door:
//!
//! - **explicit selection**: the user picked a door; the engine checks the
//!   client's assignment policy and credentials, then claims the door with
//!   one conditional update (`available` → `occupied`);
//! - **auto-assignment**: the user has no door; an external selection
//!   procedure picks one, and the requested control action is applied
//!   through the shared state machine, which binds the user and opens a
//!   session the same way explicit selection does.
//!
//! Earlier revisions skipped the session on the auto path, which left
//! assigned-but-sessionless doors behind. Both paths now open a session.
//!
//! Claiming is race-safe: "check `available`, set `occupied`" is one
//! conditional store write, so of two concurrent claims exactly one wins
//! and the loser surfaces [`EngineError::DoorUnavailable`].

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::credential::{CredentialError, MethodType, Verifier};
use crate::door::{DoorAction, DoorStateMachine, DoorStatus, LockerDoor};
use crate::error::EngineError;
use crate::events::{
    DoorEvent, DoorEventType, EventEmitter, EventSource, EVENT_DOOR_ASSIGNED,
    EVENT_DOOR_OPENED_INITIAL, EVENT_DOOR_PICKUP, EVENT_DOOR_SESSION_ENDED,
};
use crate::policy::{RequiredMethods, Resolver};
use crate::session::LockerSession;
use crate::store::{DoorSelector, DoorStore, DoorUpdate, SessionStore, StoreError, UserStore};
use crate::types::{DoorId, UserId};

/// Mandatory access-code gate shared by assignment and door control.
pub(crate) fn enforce_access_code(
    verifier: &Verifier,
    required: &RequiredMethods,
    user_id: &UserId,
    access_code: Option<&str>,
) -> Result<(), EngineError> {
    if !required.access_code() {
        return Ok(());
    }
    let code = access_code.ok_or(EngineError::AccessCodeRequired)?;
    verifier.verify(MethodType::Code, user_id, code)?;
    Ok(())
}

/// Receipt for a completed explicit assignment.
#[derive(Debug, Clone)]
pub struct AssignmentReceipt {
    /// The assigned door.
    pub door_id: DoorId,
    /// The door's status after assignment (always occupied).
    pub status: DoorStatus,
    /// The opened session.
    pub session_id: Uuid,
}

/// Receipt for an auto-assignment followed by a control action.
#[derive(Debug, Clone)]
pub struct AutoAssignReceipt {
    /// The door the selection procedure picked.
    pub door_id: DoorId,
    /// The door's status after the control action.
    pub status: DoorStatus,
}

/// Binds and releases doors, enforcing the client's assignment policy.
pub struct AssignmentEngine {
    doors: Arc<dyn DoorStore>,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    selector: Arc<dyn DoorSelector>,
    resolver: Arc<Resolver>,
    verifier: Arc<Verifier>,
    machine: Arc<DoorStateMachine>,
    emitter: Arc<EventEmitter>,
}

impl AssignmentEngine {
    /// Creates an assignment engine over the given collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        doors: Arc<dyn DoorStore>,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        selector: Arc<dyn DoorSelector>,
        resolver: Arc<Resolver>,
        verifier: Arc<Verifier>,
        machine: Arc<DoorStateMachine>,
        emitter: Arc<EventEmitter>,
    ) -> Self {
        Self {
            doors,
            sessions,
            users,
            selector,
            resolver,
            verifier,
            machine,
            emitter,
        }
    }

    /// Assigns a user-selected door to the user.
    pub fn assign(
        &self,
        door_id: &DoorId,
        user_id: &UserId,
        access_code: Option<&str>,
        source: &EventSource,
    ) -> Result<AssignmentReceipt, EngineError> {
        let door = self.load_door(door_id)?;
        if door.status != DoorStatus::Available {
            return Err(EngineError::DoorUnavailable {
                door_id: door_id.clone(),
                status: door.status,
            });
        }

        let settings = self.resolver.settings(&door.client_id)?;
        if !settings.allow_user_assignment {
            return Err(EngineError::AssignmentNotAllowed {
                client_id: door.client_id.clone(),
            });
        }
        let required = self.resolver.required_methods_for(&settings)?;
        self.enforce_access_code(&required, user_id, access_code)?;

        // The claim: one conditional write. Losing the race to another
        // assignment surfaces as the door no longer being available.
        let now = Utc::now();
        let claimed = match self.doors.update_if_status(
            door_id,
            &[DoorStatus::Available],
            DoorUpdate::status(DoorStatus::Occupied).assign_to(user_id.clone(), now),
        ) {
            Ok(claimed) => claimed,
            Err(StoreError::StatusChanged { door_id, current }) => {
                return Err(EngineError::DoorUnavailable {
                    door_id,
                    status: current,
                })
            },
            Err(StoreError::NotFound { .. }) => {
                return Err(EngineError::DoorNotFound {
                    door_id: door_id.clone(),
                })
            },
            Err(err) => return Err(err.into()),
        };

        let session = LockerSession::open(door_id.clone(), user_id.clone(), now);
        let session_id = session.id;
        self.sessions.insert(session)?;

        // Assignment implies an immediate open for first access: two audit
        // events, two notifications, all best-effort.
        self.emitter.record(&DoorEvent {
            door_id: door_id.clone(),
            user_id: Some(user_id.clone()),
            event_type: DoorEventType::Assigned,
            source: source.clone(),
            recorded_at: now,
        });
        self.emitter.record(&DoorEvent {
            door_id: door_id.clone(),
            user_id: Some(user_id.clone()),
            event_type: DoorEventType::Opened,
            source: source.suffixed("initial_access"),
            recorded_at: now,
        });
        self.emitter.publish(
            EVENT_DOOR_ASSIGNED,
            json!({
                "door_id": door_id.as_str(),
                "user_id": user_id.as_str(),
                "status": claimed.status.as_str(),
            }),
        );
        self.emitter.publish(
            EVENT_DOOR_OPENED_INITIAL,
            json!({
                "door_id": door_id.as_str(),
                "user_id": user_id.as_str(),
                "action": "opened",
            }),
        );

        tracing::info!(
            door_id = %door_id,
            user_id = %user_id,
            "locker door assigned and opened for initial access"
        );

        Ok(AssignmentReceipt {
            door_id: door_id.clone(),
            status: claimed.status,
            session_id,
        })
    }

    /// Auto-assigns a door to the user and applies a control action to it.
    pub fn auto_assign_and_control(
        &self,
        action: DoorAction,
        user_id: &UserId,
        access_code: Option<&str>,
        source: &EventSource,
    ) -> Result<AutoAssignReceipt, EngineError> {
        let user = self
            .users
            .get(user_id)?
            .ok_or_else(|| EngineError::UserNotFound {
                user_id: user_id.clone(),
            })?;
        if !user.is_active {
            return Err(EngineError::UserInactive {
                user_id: user_id.clone(),
            });
        }

        let settings = self.resolver.settings(&user.client_id)?;
        let required = self.resolver.required_methods_for(&settings)?;
        self.enforce_access_code(&required, user_id, access_code)?;

        let door_id = self.selector.select_for_user(user_id)?;
        tracing::info!(
            door_id = %door_id,
            user_id = %user_id,
            action = %action,
            "auto-assigned locker door"
        );

        let transition = self.machine.apply(&door_id, action, user_id, source)?;
        Ok(AutoAssignReceipt {
            door_id,
            status: transition.door.status,
        })
    }

    /// Ends the user's session on a door, freeing it for the next user.
    pub fn end_session(
        &self,
        door_id: &DoorId,
        user_id: &UserId,
        access_code: Option<&str>,
        source: &EventSource,
    ) -> Result<DoorStatus, EngineError> {
        let door = self.load_door(door_id)?;
        self.authorize_holder(&door, user_id)?;
        self.soft_check_access_code(user_id, access_code)?;

        let now = Utc::now();
        let released = match self.doors.update_if_status(
            door_id,
            &[DoorStatus::Occupied, DoorStatus::Overdue],
            DoorUpdate::status(DoorStatus::Available)
                .clear_assignment()
                .opened_at(now),
        ) {
            Ok(released) => released,
            Err(StoreError::StatusChanged { door_id, current }) => {
                return Err(EngineError::NotOccupied {
                    door_id,
                    status: current,
                })
            },
            Err(StoreError::NotFound { .. }) => {
                return Err(EngineError::DoorNotFound {
                    door_id: door_id.clone(),
                })
            },
            Err(err) => return Err(err.into()),
        };

        // The door is free; everything below is bookkeeping and must not
        // block it.
        match self.sessions.complete_active(door_id, user_id, now) {
            Ok(true) => {},
            Ok(false) => {
                tracing::warn!(
                    door_id = %door_id,
                    user_id = %user_id,
                    "no active session matched the ended occupancy"
                );
            },
            Err(err) => {
                tracing::warn!(
                    door_id = %door_id,
                    user_id = %user_id,
                    error = %err,
                    "failed to complete locker session, continuing"
                );
            },
        }
        self.emitter.record(&DoorEvent {
            door_id: door_id.clone(),
            user_id: Some(user_id.clone()),
            event_type: DoorEventType::Opened,
            source: source.suffixed("end_session"),
            recorded_at: now,
        });
        self.emitter.publish(
            EVENT_DOOR_SESSION_ENDED,
            json!({
                "door_id": door_id.as_str(),
                "user_id": user_id.as_str(),
                "status": released.status.as_str(),
            }),
        );

        tracing::info!(
            door_id = %door_id,
            user_id = %user_id,
            "locker session ended, door opened for pickup"
        );

        Ok(released.status)
    }

    /// Opens the door for an intermediate pickup without ending occupancy.
    pub fn pickup(
        &self,
        door_id: &DoorId,
        user_id: &UserId,
        access_code: Option<&str>,
        source: &EventSource,
    ) -> Result<(), EngineError> {
        let door = self.load_door(door_id)?;
        self.authorize_holder(&door, user_id)?;
        self.soft_check_access_code(user_id, access_code)?;

        // Only the open timestamp moves; status and assignment stay. Losing
        // a race here means the session ended mid-request, which the next
        // read will show; the pickup itself still happened at the device.
        let now = Utc::now();
        if let Err(err) = self.doors.update_if_status(
            door_id,
            &[DoorStatus::Occupied, DoorStatus::Overdue],
            DoorUpdate::touch_opened(now),
        ) {
            tracing::warn!(
                door_id = %door_id,
                error = %err,
                "failed to stamp pickup open time, continuing"
            );
        }

        self.emitter.record(&DoorEvent {
            door_id: door_id.clone(),
            user_id: Some(user_id.clone()),
            event_type: DoorEventType::Opened,
            source: source.suffixed("pickup"),
            recorded_at: now,
        });
        self.emitter.publish(
            EVENT_DOOR_PICKUP,
            json!({
                "door_id": door_id.as_str(),
                "user_id": user_id.as_str(),
                "action": "opened",
            }),
        );

        tracing::debug!(door_id = %door_id, user_id = %user_id, "door opened for pickup");
        Ok(())
    }

    fn load_door(&self, door_id: &DoorId) -> Result<LockerDoor, EngineError> {
        self.doors
            .get(door_id)?
            .ok_or_else(|| EngineError::DoorNotFound {
                door_id: door_id.clone(),
            })
    }

    /// Holder and occupancy preconditions shared by end-session and pickup.
    fn authorize_holder(&self, door: &LockerDoor, user_id: &UserId) -> Result<(), EngineError> {
        if door.assigned_user_id.as_ref() != Some(user_id) {
            return Err(EngineError::Unauthorized {
                door_id: door.id.clone(),
                user_id: user_id.clone(),
            });
        }
        if !matches!(door.status, DoorStatus::Occupied | DoorStatus::Overdue) {
            return Err(EngineError::NotOccupied {
                door_id: door.id.clone(),
                status: door.status,
            });
        }
        Ok(())
    }

    fn enforce_access_code(
        &self,
        required: &RequiredMethods,
        user_id: &UserId,
        access_code: Option<&str>,
    ) -> Result<(), EngineError> {
        enforce_access_code(&self.verifier, required, user_id, access_code)
    }

    /// Opportunistic access-code check used by end-session and pickup.
    ///
    /// A supplied code that mismatches an active credential is rejected; a
    /// missing code, missing credential, or retired credential is not an
    /// error on this path.
    fn soft_check_access_code(
        &self,
        user_id: &UserId,
        access_code: Option<&str>,
    ) -> Result<(), EngineError> {
        let Some(code) = access_code else {
            return Ok(());
        };
        match self.verifier.verify(MethodType::Code, user_id, code) {
            Ok(()) => Ok(()),
            Err(CredentialError::Mismatch) => Err(EngineError::InvalidAccessCode),
            Err(CredentialError::NotFound { .. } | CredentialError::Inactive { .. }) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %err,
                    "soft access-code check failed to run, continuing"
                );
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::credential::Credential;
    use crate::events::{EventEmitter, MemoryEventSink, MemoryNotifier};
    use crate::policy::{AuthMethodBinding, ClientLockerSettings, RequiredMethod};
    use crate::store::{
        FirstAvailableSelector, MemoryCredentialStore, MemoryDoorStore, MemorySessionStore,
        MemorySettingsStore, MemoryUserStore,
    };
    use crate::types::{ClientId, SettingId, User};

    struct Fixture {
        doors: Arc<MemoryDoorStore>,
        sessions: Arc<MemorySessionStore>,
        credentials: Arc<MemoryCredentialStore>,
        sink: Arc<MemoryEventSink>,
        notifier: Arc<MemoryNotifier>,
        engine: Arc<AssignmentEngine>,
    }

    fn fixture(allow_user_assignment: bool, require_code: bool) -> Fixture {
        let doors = Arc::new(MemoryDoorStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let credentials = Arc::new(MemoryCredentialStore::new());
        let settings = Arc::new(MemorySettingsStore::new());
        let users = Arc::new(MemoryUserStore::new());
        let sink = Arc::new(MemoryEventSink::new());
        let notifier = Arc::new(MemoryNotifier::new());

        for (id, name) in [("u1", "Avery Quinn"), ("u2", "Sam Reyes")] {
            users
                .insert(User {
                    id: UserId::new(id),
                    client_id: ClientId::new("c1"),
                    full_name: name.into(),
                    is_active: true,
                })
                .unwrap();
        }
        users
            .insert(User {
                id: UserId::new("u-off"),
                client_id: ClientId::new("c1"),
                full_name: "Former Tenant".into(),
                is_active: false,
            })
            .unwrap();

        let setting_id = SettingId::new("s1");
        settings
            .insert_settings(ClientLockerSettings {
                id: setting_id.clone(),
                client_id: ClientId::new("c1"),
                allow_user_assignment,
            })
            .unwrap();
        if require_code {
            settings
                .bind_method(
                    &setting_id,
                    AuthMethodBinding {
                        method: RequiredMethod::AccessCode,
                        catalog_active: true,
                    },
                )
                .unwrap();
        }

        doors
            .insert(LockerDoor::available(
                DoorId::new("d1"),
                ClientId::new("c1"),
                1,
            ))
            .unwrap();

        let emitter = Arc::new(EventEmitter::new(
            sink.clone(),
            notifier.clone(),
            "locker_updates",
            std::time::Duration::from_millis(250),
        ));
        let resolver = Arc::new(crate::policy::Resolver::new(settings.clone()));
        let verifier = Arc::new(Verifier::new(credentials.clone(), users.clone()));
        let machine = Arc::new(DoorStateMachine::new(
            doors.clone(),
            sessions.clone(),
            emitter.clone(),
        ));
        let selector = Arc::new(FirstAvailableSelector::new(doors.clone(), users.clone()));
        let engine = Arc::new(AssignmentEngine::new(
            doors.clone(),
            sessions.clone(),
            users,
            selector,
            resolver,
            verifier,
            machine,
            emitter,
        ));

        Fixture {
            doors,
            sessions,
            credentials,
            sink,
            notifier,
            engine,
        }
    }

    fn seed_code(fx: &Fixture, user: &str, code: &str) {
        let hash = bcrypt::hash(code, 4).unwrap();
        fx.credentials
            .insert(Credential::active(
                UserId::new(user),
                MethodType::Code,
                hash,
                Utc::now(),
            ))
            .unwrap();
    }

    fn door(fx: &Fixture) -> LockerDoor {
        fx.doors.get(&DoorId::new("d1")).unwrap().unwrap()
    }

    fn source() -> EventSource {
        EventSource::new("apk")
    }

    #[test]
    fn assign_claims_door_and_opens_session() {
        let fx = fixture(true, false);
        let receipt = fx
            .engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();

        assert_eq!(receipt.status, DoorStatus::Occupied);
        let d = door(&fx);
        assert_eq!(d.assigned_user_id, Some(UserId::new("u1")));
        assert!(d.assignment_consistent());

        let session = fx
            .sessions
            .active_for_door(&DoorId::new("d1"))
            .unwrap()
            .unwrap();
        assert_eq!(session.id, receipt.session_id);
        assert_eq!(session.user_id, UserId::new("u1"));

        let events = fx.sink.events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type.as_str(), "assigned");
        assert_eq!(events[1].event_type.as_str(), "opened");
        assert_eq!(events[1].source.as_str(), "apk_initial_access");

        let published = fx.notifier.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].event, EVENT_DOOR_ASSIGNED);
        assert_eq!(published[1].event, EVENT_DOOR_OPENED_INITIAL);
    }

    #[test]
    fn assign_rejects_a_held_door() {
        let fx = fixture(true, false);
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();

        let err = fx
            .engine
            .assign(&DoorId::new("d1"), &UserId::new("u2"), None, &source())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DoorUnavailable {
                status: DoorStatus::Occupied,
                ..
            }
        ));
    }

    #[test]
    fn assign_respects_the_client_policy() {
        let fx = fixture(false, false);
        let err = fx
            .engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap_err();
        assert!(matches!(err, EngineError::AssignmentNotAllowed { .. }));
        assert_eq!(door(&fx).status, DoorStatus::Available);
        assert!(fx.sink.is_empty().unwrap());
    }

    #[test]
    fn assign_enforces_the_access_code_gate() {
        let fx = fixture(true, true);
        seed_code(&fx, "u1", "4711");

        assert!(matches!(
            fx.engine
                .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source()),
            Err(EngineError::AccessCodeRequired)
        ));
        assert!(matches!(
            fx.engine
                .assign(&DoorId::new("d1"), &UserId::new("u1"), Some("0000"), &source()),
            Err(EngineError::InvalidAccessCode)
        ));
        assert_eq!(door(&fx).status, DoorStatus::Available);

        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), Some("4711"), &source())
            .unwrap();
        assert_eq!(door(&fx).status, DoorStatus::Occupied);
    }

    #[test]
    fn concurrent_assignment_has_exactly_one_winner() {
        let fx = fixture(true, false);
        let engines: Vec<_> = ["u1", "u2"]
            .into_iter()
            .map(|user| {
                let engine = fx.engine.clone();
                thread::spawn(move || {
                    engine.assign(&DoorId::new("d1"), &UserId::new(user), None, &source())
                })
            })
            .collect();
        let outcomes: Vec<_> = engines.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, EngineError::DoorUnavailable { .. })));
        assert!(door(&fx).assignment_consistent());
    }

    #[test]
    fn end_session_frees_the_door_for_the_next_user() {
        let fx = fixture(true, false);
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();

        let status = fx
            .engine
            .end_session(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();
        assert_eq!(status, DoorStatus::Available);

        let d = door(&fx);
        assert!(d.assigned_user_id.is_none());
        assert!(d.last_opened_at.is_some());
        assert!(fx
            .sessions
            .active_for_door(&DoorId::new("d1"))
            .unwrap()
            .is_none());

        // The freed door is immediately assignable.
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u2"), None, &source())
            .unwrap();

        let published = fx.notifier.published();
        assert!(published.iter().any(|n| n.event == EVENT_DOOR_SESSION_ENDED));
    }

    #[test]
    fn end_session_requires_the_holder() {
        let fx = fixture(true, false);
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();
        let before = door(&fx);

        let err = fx
            .engine
            .end_session(&DoorId::new("d1"), &UserId::new("u2"), None, &source())
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
        assert_eq!(door(&fx), before);
    }

    #[test]
    fn end_session_rejects_a_door_not_occupied() {
        let fx = fixture(true, false);
        let err = fx
            .engine
            .end_session(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap_err();
        // An available door has no holder, so the holder check fires first.
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }

    #[test]
    fn end_session_soft_checks_a_supplied_code() {
        let fx = fixture(true, false);
        seed_code(&fx, "u1", "4711");
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();

        assert!(matches!(
            fx.engine
                .end_session(&DoorId::new("d1"), &UserId::new("u1"), Some("0000"), &source()),
            Err(EngineError::InvalidAccessCode)
        ));
        assert_eq!(door(&fx).status, DoorStatus::Occupied);

        fx.engine
            .end_session(&DoorId::new("d1"), &UserId::new("u1"), Some("4711"), &source())
            .unwrap();
    }

    #[test]
    fn end_session_tolerates_a_missing_credential() {
        let fx = fixture(true, false);
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();

        // u1 never registered a code; a supplied one cannot be checked and
        // does not block the release.
        fx.engine
            .end_session(&DoorId::new("d1"), &UserId::new("u1"), Some("4711"), &source())
            .unwrap();
    }

    #[test]
    fn pickup_opens_without_changing_occupancy() {
        let fx = fixture(true, false);
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();
        let before = door(&fx);

        fx.engine
            .pickup(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();

        let after = door(&fx);
        assert_eq!(after.status, before.status);
        assert_eq!(after.assigned_user_id, before.assigned_user_id);
        assert!(fx
            .sessions
            .active_for_door(&DoorId::new("d1"))
            .unwrap()
            .is_some());

        let events = fx.sink.events().unwrap();
        let pickup = events.last().unwrap();
        assert_eq!(pickup.source.as_str(), "apk_pickup");
        assert!(fx
            .notifier
            .published()
            .iter()
            .any(|n| n.event == EVENT_DOOR_PICKUP));
    }

    #[test]
    fn pickup_requires_the_holder() {
        let fx = fixture(true, false);
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();

        assert!(matches!(
            fx.engine
                .pickup(&DoorId::new("d1"), &UserId::new("u2"), None, &source()),
            Err(EngineError::Unauthorized { .. })
        ));
    }

    #[test]
    fn auto_assign_binds_session_like_explicit_assignment() {
        let fx = fixture(true, false);
        let receipt = fx
            .engine
            .auto_assign_and_control(DoorAction::Opened, &UserId::new("u1"), None, &source())
            .unwrap();

        assert_eq!(receipt.door_id, DoorId::new("d1"));
        assert_eq!(receipt.status, DoorStatus::Occupied);
        let d = door(&fx);
        assert_eq!(d.assigned_user_id, Some(UserId::new("u1")));
        assert!(fx
            .sessions
            .active_for_door(&DoorId::new("d1"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn auto_assign_requires_an_active_user() {
        let fx = fixture(true, false);
        assert!(matches!(
            fx.engine.auto_assign_and_control(
                DoorAction::Opened,
                &UserId::new("ghost"),
                None,
                &source()
            ),
            Err(EngineError::UserNotFound { .. })
        ));
        assert!(matches!(
            fx.engine.auto_assign_and_control(
                DoorAction::Opened,
                &UserId::new("u-off"),
                None,
                &source()
            ),
            Err(EngineError::UserInactive { .. })
        ));
    }

    #[test]
    fn auto_assign_reports_exhaustion() {
        let fx = fixture(true, false);
        fx.engine
            .assign(&DoorId::new("d1"), &UserId::new("u1"), None, &source())
            .unwrap();

        let err = fx
            .engine
            .auto_assign_and_control(DoorAction::Opened, &UserId::new("u2"), None, &source())
            .unwrap_err();
        assert!(matches!(err, EngineError::NoDoorAvailable { .. }));
    }

    #[test]
    fn auto_assign_enforces_the_access_code_gate() {
        let fx = fixture(true, true);
        seed_code(&fx, "u1", "4711");

        assert!(matches!(
            fx.engine
                .auto_assign_and_control(DoorAction::Opened, &UserId::new("u1"), None, &source()),
            Err(EngineError::AccessCodeRequired)
        ));

        fx.engine
            .auto_assign_and_control(
                DoorAction::Opened,
                &UserId::new("u1"),
                Some("4711"),
                &source(),
            )
            .unwrap();
        assert_eq!(door(&fx).status, DoorStatus::Occupied);
    }

    #[test]
    fn unprovisioned_client_blocks_assignment() {
        let fx = fixture(true, false);
        // A door owned by a client with no locker-settings row.
        fx.doors
            .insert(LockerDoor::available(
                DoorId::new("d-far"),
                ClientId::new("c2"),
                1,
            ))
            .unwrap();

        let err = fx
            .engine
            .assign(&DoorId::new("d-far"), &UserId::new("u1"), None, &source())
            .unwrap_err();
        assert!(matches!(err, EngineError::SettingsNotFound { .. }));
    }
}
