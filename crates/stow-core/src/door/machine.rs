//! The door state machine: validated, atomically-applied transitions.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::{next_status, DoorAction, DoorStatus, LockerDoor};
use crate::error::EngineError;
use crate::events::{DoorEvent, EventEmitter, EventSource, EVENT_DOOR_STATUS_CHANGE};
use crate::session::LockerSession;
use crate::store::{DoorStore, DoorUpdate, SessionStore, StoreError};
use crate::types::{DoorId, UserId};

/// A successfully applied door transition.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The door row after the transition.
    pub door: LockerDoor,
    /// The status the door held before.
    pub previous_status: DoorStatus,
    /// The action that drove the transition.
    pub action: DoorAction,
}

/// Owns every status change of a door row.
///
/// A transition is: read the row, compute the target status through
/// [`next_status`], and write through the store's conditional update keyed
/// on the status that was read. A concurrent writer makes the conditional
/// update fail instead of silently overwriting.
///
/// Assignment bookkeeping rides along so the occupancy invariant (holder
/// recorded ⇔ status held) survives every transition:
///
/// - a transition onto a held status binds the acting user when the door
///   has no holder yet, and opens a session for the new holder;
/// - a transition back to `available` clears the holder and completes the
///   door's active session.
///
/// Audit events, notifications, and session rows are secondary: failures
/// there are logged and the transition still succeeds.
pub struct DoorStateMachine {
    doors: Arc<dyn DoorStore>,
    sessions: Arc<dyn SessionStore>,
    emitter: Arc<EventEmitter>,
}

impl DoorStateMachine {
    /// Creates a state machine over the given collaborators.
    #[must_use]
    pub fn new(
        doors: Arc<dyn DoorStore>,
        sessions: Arc<dyn SessionStore>,
        emitter: Arc<EventEmitter>,
    ) -> Self {
        Self {
            doors,
            sessions,
            emitter,
        }
    }

    /// Applies one action to a door.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DoorNotFound`] if the door does not exist
    /// - [`EngineError::StateChanged`] if a concurrent request transitioned
    ///   the door between the read and the conditional write
    pub fn apply(
        &self,
        door_id: &DoorId,
        action: DoorAction,
        user_id: &UserId,
        source: &EventSource,
    ) -> Result<Transition, EngineError> {
        let door = self
            .doors
            .get(door_id)?
            .ok_or_else(|| EngineError::DoorNotFound {
                door_id: door_id.clone(),
            })?;

        let target = next_status(action);
        let now = Utc::now();
        let previous_holder = door.assigned_user_id.clone();

        let mut update = DoorUpdate::status(target);
        if action == DoorAction::Opened {
            update = update.opened_at(now);
        }
        let binds_holder = target.is_held() && previous_holder.is_none();
        if binds_holder {
            update = update.assign_to(user_id.clone(), now);
        } else if !target.is_held() {
            update = update.clear_assignment();
        }

        let updated = match self.doors.update_if_status(door_id, &[door.status], update) {
            Ok(updated) => updated,
            Err(StoreError::NotFound { .. }) => {
                return Err(EngineError::DoorNotFound {
                    door_id: door_id.clone(),
                })
            },
            Err(StoreError::StatusChanged { door_id, current }) => {
                tracing::debug!(
                    door_id = %door_id,
                    current = %current,
                    action = %action,
                    "door transition lost its race"
                );
                return Err(EngineError::StateChanged { door_id, current });
            },
            Err(err) => return Err(err.into()),
        };

        // Session bookkeeping follows the assignment columns. Best-effort:
        // the door row is already the source of truth for occupancy.
        if binds_holder {
            if let Err(err) = self
                .sessions
                .insert(LockerSession::open(door_id.clone(), user_id.clone(), now))
            {
                tracing::warn!(
                    door_id = %door_id,
                    user_id = %user_id,
                    error = %err,
                    "failed to open locker session, continuing"
                );
            }
        } else if !target.is_held() {
            let holder = previous_holder.as_ref().unwrap_or(user_id);
            match self.sessions.complete_active(door_id, holder, now) {
                Ok(_) => {},
                Err(err) => {
                    tracing::warn!(
                        door_id = %door_id,
                        user_id = %holder,
                        error = %err,
                        "failed to complete locker session, continuing"
                    );
                },
            }
        }

        self.emitter.record(&DoorEvent {
            door_id: door_id.clone(),
            user_id: Some(user_id.clone()),
            event_type: action.into(),
            source: source.clone(),
            recorded_at: now,
        });
        self.emitter.publish(
            EVENT_DOOR_STATUS_CHANGE,
            json!({
                "door_id": door_id.as_str(),
                "action": action.as_str(),
                "status": updated.status.as_str(),
            }),
        );

        Ok(Transition {
            door: updated,
            previous_status: door.status,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::events::{MemoryEventSink, MemoryNotifier};
    use crate::store::{MemoryDoorStore, MemorySessionStore};
    use crate::types::ClientId;

    struct Fixture {
        doors: Arc<MemoryDoorStore>,
        sessions: Arc<MemorySessionStore>,
        sink: Arc<MemoryEventSink>,
        notifier: Arc<MemoryNotifier>,
        machine: DoorStateMachine,
    }

    fn fixture() -> Fixture {
        let doors = Arc::new(MemoryDoorStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let sink = Arc::new(MemoryEventSink::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let emitter = Arc::new(EventEmitter::new(
            sink.clone(),
            notifier.clone(),
            "locker_updates",
            std::time::Duration::from_millis(250),
        ));
        let machine = DoorStateMachine::new(doors.clone(), sessions.clone(), emitter);
        doors
            .insert(LockerDoor::available(
                DoorId::new("d1"),
                ClientId::new("c1"),
                1,
            ))
            .unwrap();
        Fixture {
            doors,
            sessions,
            sink,
            notifier,
            machine,
        }
    }

    fn apply(fx: &Fixture, action: DoorAction) -> Result<Transition, EngineError> {
        fx.machine.apply(
            &DoorId::new("d1"),
            action,
            &UserId::new("u1"),
            &EventSource::new("apk"),
        )
    }

    #[test]
    fn opened_binds_the_actor_and_opens_a_session() {
        let fx = fixture();
        let transition = apply(&fx, DoorAction::Opened).unwrap();

        assert_eq!(transition.door.status, DoorStatus::Occupied);
        assert_eq!(transition.door.assigned_user_id, Some(UserId::new("u1")));
        assert!(transition.door.last_opened_at.is_some());
        assert!(fx
            .sessions
            .active_for_door(&DoorId::new("d1"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn closed_releases_holder_and_completes_session() {
        let fx = fixture();
        apply(&fx, DoorAction::Opened).unwrap();
        let transition = apply(&fx, DoorAction::Closed).unwrap();

        assert_eq!(transition.door.status, DoorStatus::Available);
        assert!(transition.door.assigned_user_id.is_none());
        assert!(fx
            .sessions
            .active_for_door(&DoorId::new("d1"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn locked_keeps_the_existing_holder() {
        let fx = fixture();
        apply(&fx, DoorAction::Opened).unwrap();
        let transition = apply(&fx, DoorAction::Locked).unwrap();

        assert_eq!(transition.door.status, DoorStatus::Locked);
        assert_eq!(transition.door.assigned_user_id, Some(UserId::new("u1")));
        // Locking does not end the occupancy interval.
        assert!(fx
            .sessions
            .active_for_door(&DoorId::new("d1"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn transition_records_event_and_notification() {
        let fx = fixture();
        apply(&fx, DoorAction::Opened).unwrap();

        let events = fx.sink.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), "opened");
        assert_eq!(events[0].source.as_str(), "apk");

        let published = fx.notifier.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event, EVENT_DOOR_STATUS_CHANGE);
        assert_eq!(published[0].payload["status"], "occupied");
    }

    #[test]
    fn missing_door_is_not_found() {
        let fx = fixture();
        let err = fx
            .machine
            .apply(
                &DoorId::new("ghost"),
                DoorAction::Opened,
                &UserId::new("u1"),
                &EventSource::new("apk"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::DoorNotFound { .. }));
        assert!(fx.sink.is_empty().unwrap());
    }

    proptest! {
        /// The occupancy invariant holds after any sequence of actions.
        #[test]
        fn invariant_holds_across_action_sequences(actions in prop::collection::vec(0..4usize, 0..24)) {
            let fx = fixture();
            let table = [
                DoorAction::Opened,
                DoorAction::Closed,
                DoorAction::Locked,
                DoorAction::Unlocked,
            ];
            for index in actions {
                let _ = apply(&fx, table[index]);
                let door = fx.doors.get(&DoorId::new("d1")).unwrap().unwrap();
                prop_assert!(door.assignment_consistent(), "door out of sync: {door:?}");
            }
        }
    }
}
