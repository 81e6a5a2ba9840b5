//! In-memory reference implementations of the collaborator traits.
//!
//! These back the test suite and single-process embeddings. They are
//! `Send + Sync`; the door store's conditional update runs its check and
//! write under one write lock, giving the same atomicity a conditional SQL
//! `UPDATE` provides.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::{
    AssignmentChange, CredentialStore, DoorSelector, DoorStore, DoorUpdate, SelectionError,
    SessionStore, SettingsStore, StoreError, UserStore,
};
use crate::credential::{Credential, MethodType};
use crate::door::{DoorStatus, LockerDoor};
use crate::policy::{AuthMethodBinding, ClientLockerSettings};
use crate::session::{LockerSession, SessionStatus};
use crate::types::{ClientId, DoorId, SettingId, User, UserId};

/// Door rows held in a `RwLock`ed map.
#[derive(Debug, Default)]
pub struct MemoryDoorStore {
    doors: RwLock<HashMap<DoorId, LockerDoor>>,
}

impl MemoryDoorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisions a door. Replaces any existing row with the same id.
    pub fn insert(&self, door: LockerDoor) -> Result<(), StoreError> {
        let mut doors = self.doors.write().map_err(|_| StoreError::LockPoisoned)?;
        doors.insert(door.id.clone(), door);
        Ok(())
    }
}

impl DoorStore for MemoryDoorStore {
    fn get(&self, id: &DoorId) -> Result<Option<LockerDoor>, StoreError> {
        let doors = self.doors.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(doors.get(id).cloned())
    }

    fn list_by_client(&self, client_id: &ClientId) -> Result<Vec<LockerDoor>, StoreError> {
        let doors = self.doors.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut rows: Vec<LockerDoor> = doors
            .values()
            .filter(|d| &d.client_id == client_id)
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.door_number);
        Ok(rows)
    }

    fn update_if_status(
        &self,
        id: &DoorId,
        expected: &[DoorStatus],
        update: DoorUpdate,
    ) -> Result<LockerDoor, StoreError> {
        let mut doors = self.doors.write().map_err(|_| StoreError::LockPoisoned)?;
        let door = doors.get_mut(id).ok_or_else(|| StoreError::NotFound {
            entity: "door",
            id: id.to_string(),
        })?;

        if !expected.contains(&door.status) {
            return Err(StoreError::StatusChanged {
                door_id: id.clone(),
                current: door.status,
            });
        }

        if let Some(status) = update.status {
            door.status = status;
        }
        match update.assignment {
            AssignmentChange::Keep => {},
            AssignmentChange::Set {
                user_id,
                assigned_at,
            } => {
                door.assigned_user_id = Some(user_id);
                door.assigned_at = Some(assigned_at);
            },
            AssignmentChange::Clear => {
                door.assigned_user_id = None;
                door.assigned_at = None;
            },
        }
        if let Some(at) = update.last_opened_at {
            door.last_opened_at = Some(at);
        }

        Ok(door.clone())
    }
}

/// Session rows held in an append-friendly vector.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<Vec<LockerSession>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all sessions recorded so far.
    pub fn all(&self) -> Result<Vec<LockerSession>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(sessions.clone())
    }
}

impl SessionStore for MemorySessionStore {
    fn insert(&self, session: LockerSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        sessions.push(session);
        Ok(())
    }

    fn active_for_door(&self, door_id: &DoorId) -> Result<Option<LockerSession>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(sessions
            .iter()
            .find(|s| &s.locker_door_id == door_id && s.is_active())
            .cloned())
    }

    fn complete_active(
        &self,
        door_id: &DoorId,
        user_id: &UserId,
        end_time: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(session) = sessions
            .iter_mut()
            .find(|s| &s.locker_door_id == door_id && &s.user_id == user_id && s.is_active())
        else {
            return Ok(false);
        };
        session.end_time = Some(end_time);
        session.status = SessionStatus::Completed;
        Ok(true)
    }
}

/// Credential rows held in insertion order.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    rows: RwLock<Vec<Credential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a credential row as-is, without retiring anything.
    pub fn insert(&self, credential: Credential) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        rows.push(credential);
        Ok(())
    }

    /// Counts active credentials for `(user, method)`.
    pub fn active_count(&self, user_id: &UserId, method: MethodType) -> Result<usize, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(rows
            .iter()
            .filter(|c| &c.user_id == user_id && c.method == method && c.is_active)
            .count())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn current_for_user(
        &self,
        user_id: &UserId,
        method: MethodType,
    ) -> Result<Option<Credential>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        // Newest row wins; replace_active appends, so the tail is current.
        Ok(rows
            .iter()
            .rev()
            .find(|c| &c.user_id == user_id && c.method == method)
            .cloned())
    }

    fn find_by_value(
        &self,
        stored_value: &str,
        method: MethodType,
    ) -> Result<Option<Credential>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut newest_inactive = None;
        for row in rows
            .iter()
            .filter(|c| c.method == method && c.secret.stored_value() == stored_value)
        {
            if row.is_active {
                return Ok(Some(row.clone()));
            }
            newest_inactive = Some(row.clone());
        }
        Ok(newest_inactive)
    }

    fn list_active(&self, method: MethodType) -> Result<Vec<Credential>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(rows
            .iter()
            .filter(|c| c.method == method && c.is_active)
            .cloned()
            .collect())
    }

    fn replace_active(&self, credential: Credential) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        // Retire-then-insert under one lock: no window where zero or two
        // active credentials exist for the pair.
        for row in rows
            .iter_mut()
            .filter(|c| c.user_id == credential.user_id && c.method == credential.method)
        {
            row.is_active = false;
        }
        rows.push(credential);
        Ok(())
    }
}

/// Client settings and auth-method bindings.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<HashMap<ClientId, ClientLockerSettings>>,
    bindings: RwLock<HashMap<SettingId, Vec<AuthMethodBinding>>>,
}

impl MemorySettingsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisions a client's locker settings.
    pub fn insert_settings(&self, settings: ClientLockerSettings) -> Result<(), StoreError> {
        let mut map = self.settings.write().map_err(|_| StoreError::LockPoisoned)?;
        map.insert(settings.client_id.clone(), settings);
        Ok(())
    }

    /// Binds an auth method to a settings row.
    pub fn bind_method(
        &self,
        setting_id: &SettingId,
        binding: AuthMethodBinding,
    ) -> Result<(), StoreError> {
        let mut map = self.bindings.write().map_err(|_| StoreError::LockPoisoned)?;
        map.entry(setting_id.clone()).or_default().push(binding);
        Ok(())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn locker_settings(
        &self,
        client_id: &ClientId,
    ) -> Result<Option<ClientLockerSettings>, StoreError> {
        let map = self.settings.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(client_id).cloned())
    }

    fn auth_method_bindings(
        &self,
        setting_id: &SettingId,
    ) -> Result<Vec<AuthMethodBinding>, StoreError> {
        let map = self.bindings.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(setting_id).cloned().unwrap_or_default())
    }
}

/// User rows held in a map.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisions a user.
    pub fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::LockPoisoned)?;
        users.insert(user.id.clone(), user);
        Ok(())
    }
}

impl UserStore for MemoryUserStore {
    fn get(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(users.get(id).cloned())
    }
}

/// Reference door selector: the user's client's lowest-numbered available
/// door.
///
/// Deployments with a richer placement procedure supply their own
/// [`DoorSelector`].
pub struct FirstAvailableSelector {
    doors: Arc<dyn DoorStore>,
    users: Arc<dyn UserStore>,
}

impl FirstAvailableSelector {
    /// Creates a selector over the given stores.
    #[must_use]
    pub fn new(doors: Arc<dyn DoorStore>, users: Arc<dyn UserStore>) -> Self {
        Self { doors, users }
    }
}

impl DoorSelector for FirstAvailableSelector {
    fn select_for_user(&self, user_id: &UserId) -> Result<DoorId, SelectionError> {
        let Some(user) = self.users.get(user_id)? else {
            return Err(SelectionError::NoDoorAvailable {
                user_id: user_id.clone(),
            });
        };
        self.doors
            .list_by_client(&user.client_id)?
            .into_iter()
            .find(|d| d.status == DoorStatus::Available)
            .map(|d| d.id)
            .ok_or_else(|| SelectionError::NoDoorAvailable {
                user_id: user_id.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AssignmentChange;

    fn door(id: &str, number: u32) -> LockerDoor {
        LockerDoor::available(DoorId::new(id), ClientId::new("c1"), number)
    }

    #[test]
    fn conditional_update_applies_when_status_matches() {
        let store = MemoryDoorStore::new();
        store.insert(door("d1", 1)).unwrap();

        let updated = store
            .update_if_status(
                &DoorId::new("d1"),
                &[DoorStatus::Available],
                DoorUpdate::status(DoorStatus::Occupied)
                    .assign_to(UserId::new("u1"), Utc::now()),
            )
            .unwrap();

        assert_eq!(updated.status, DoorStatus::Occupied);
        assert_eq!(updated.assigned_user_id, Some(UserId::new("u1")));
    }

    #[test]
    fn conditional_update_rejects_stale_precondition() {
        let store = MemoryDoorStore::new();
        let mut d = door("d1", 1);
        d.status = DoorStatus::Locked;
        store.insert(d).unwrap();

        let err = store
            .update_if_status(
                &DoorId::new("d1"),
                &[DoorStatus::Available],
                DoorUpdate::status(DoorStatus::Occupied),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::StatusChanged {
                current: DoorStatus::Locked,
                ..
            }
        ));
    }

    #[test]
    fn conditional_update_on_missing_door() {
        let store = MemoryDoorStore::new();
        let err = store
            .update_if_status(
                &DoorId::new("nope"),
                &[DoorStatus::Available],
                DoorUpdate::status(DoorStatus::Occupied),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "door", .. }));
    }

    #[test]
    fn clear_assignment_resets_both_columns() {
        let store = MemoryDoorStore::new();
        let mut d = door("d1", 1);
        d.status = DoorStatus::Occupied;
        d.assigned_user_id = Some(UserId::new("u1"));
        d.assigned_at = Some(Utc::now());
        store.insert(d).unwrap();

        let updated = store
            .update_if_status(
                &DoorId::new("d1"),
                &[DoorStatus::Occupied],
                DoorUpdate {
                    status: Some(DoorStatus::Available),
                    assignment: AssignmentChange::Clear,
                    last_opened_at: Some(Utc::now()),
                },
            )
            .unwrap();

        assert_eq!(updated.status, DoorStatus::Available);
        assert!(updated.assigned_user_id.is_none());
        assert!(updated.assigned_at.is_none());
        assert!(updated.last_opened_at.is_some());
    }

    #[test]
    fn replace_active_retires_exactly_the_previous_credential() {
        let store = MemoryCredentialStore::new();
        let user = UserId::new("u1");
        store
            .insert(Credential::active(
                user.clone(),
                MethodType::Code,
                "1111",
                Utc::now(),
            ))
            .unwrap();

        store
            .replace_active(Credential::active(
                user.clone(),
                MethodType::Code,
                "2222",
                Utc::now(),
            ))
            .unwrap();

        assert_eq!(store.active_count(&user, MethodType::Code).unwrap(), 1);
        let current = store
            .current_for_user(&user, MethodType::Code)
            .unwrap()
            .unwrap();
        assert!(current.is_active);
        assert_eq!(current.secret.stored_value(), "2222");
    }

    #[test]
    fn replace_active_leaves_other_methods_alone() {
        let store = MemoryCredentialStore::new();
        let user = UserId::new("u1");
        store
            .insert(Credential::active(
                user.clone(),
                MethodType::Card,
                "cardhash",
                Utc::now(),
            ))
            .unwrap();
        store
            .replace_active(Credential::active(
                user.clone(),
                MethodType::Code,
                "2222",
                Utc::now(),
            ))
            .unwrap();

        assert_eq!(store.active_count(&user, MethodType::Card).unwrap(), 1);
    }

    #[test]
    fn find_by_value_prefers_active_rows() {
        let store = MemoryCredentialStore::new();
        let mut retired = Credential::active(UserId::new("u1"), MethodType::Card, "h", Utc::now());
        retired.is_active = false;
        store.insert(retired).unwrap();
        store
            .insert(Credential::active(
                UserId::new("u2"),
                MethodType::Card,
                "h",
                Utc::now(),
            ))
            .unwrap();

        let found = store.find_by_value("h", MethodType::Card).unwrap().unwrap();
        assert_eq!(found.user_id, UserId::new("u2"));
        assert!(found.is_active);
    }

    #[test]
    fn complete_active_matches_door_and_user() {
        let store = MemorySessionStore::new();
        let session = LockerSession::open(DoorId::new("d1"), UserId::new("u1"), Utc::now());
        store.insert(session).unwrap();

        assert!(!store
            .complete_active(&DoorId::new("d1"), &UserId::new("u2"), Utc::now())
            .unwrap());
        assert!(store
            .complete_active(&DoorId::new("d1"), &UserId::new("u1"), Utc::now())
            .unwrap());
        assert!(store
            .active_for_door(&DoorId::new("d1"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn first_available_selector_walks_door_numbers() {
        let doors = Arc::new(MemoryDoorStore::new());
        let users = Arc::new(MemoryUserStore::new());
        users
            .insert(User {
                id: UserId::new("u1"),
                client_id: ClientId::new("c1"),
                full_name: "Avery Quinn".into(),
                is_active: true,
            })
            .unwrap();
        let mut taken = door("d1", 1);
        taken.status = DoorStatus::Locked;
        doors.insert(taken).unwrap();
        doors.insert(door("d2", 2)).unwrap();

        let selector = FirstAvailableSelector::new(doors, users);
        assert_eq!(
            selector.select_for_user(&UserId::new("u1")).unwrap(),
            DoorId::new("d2")
        );
    }

    #[test]
    fn first_available_selector_reports_exhaustion() {
        let doors = Arc::new(MemoryDoorStore::new());
        let users = Arc::new(MemoryUserStore::new());
        users
            .insert(User {
                id: UserId::new("u1"),
                client_id: ClientId::new("c1"),
                full_name: "Avery Quinn".into(),
                is_active: true,
            })
            .unwrap();

        let err = FirstAvailableSelector::new(doors, users)
            .select_for_user(&UserId::new("u1"))
            .unwrap_err();
        assert!(matches!(err, SelectionError::NoDoorAvailable { .. }));
    }
}
