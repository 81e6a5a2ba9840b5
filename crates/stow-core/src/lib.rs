//! Core engine for locker door access and assignment.
//!
//! This crate mediates every interaction between users and the doors of a
//! smart locker bank: assignment, credential verification, door state
//! transitions, session bookkeeping, and change notifications. It contains
//! no transport layer and no physical actuation; embedders wire the
//! collaborator traits in [`store`] to their database and message broker and
//! expose [`engine::LockerEngine`] over whatever surface they run.
//!
//! # Architecture
//!
//! - [`door`] — door status, the action transition table, and the state
//!   machine that applies transitions through conditional store writes
//! - [`assignment`] — binding doors to users and releasing them, under the
//!   client's assignment policy
//! - [`credential`] — verification and registration of access codes, card
//!   UIDs, and face template hashes
//! - [`policy`] — per-client auth-method requirements
//! - [`events`] — best-effort audit trail and notification fan-out
//! - [`session`] — occupancy intervals
//! - [`store`] — collaborator traits plus in-memory reference
//!   implementations
//! - [`engine`] — the facade wiring it all together
//!
//! # Concurrency
//!
//! All operations are short-lived synchronous units of work. Door rows are
//! the one shared mutable resource; every mutation goes through
//! [`store::DoorStore::update_if_status`], a conditional write keyed on the
//! status the caller read, so concurrent requests against one door resolve
//! to exactly one winner.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use stow_core::config::EngineConfig;
//! use stow_core::door::LockerDoor;
//! use stow_core::engine::{EngineStores, LockerEngine};
//! use stow_core::events::{MemoryEventSink, MemoryNotifier};
//! use stow_core::policy::ClientLockerSettings;
//! use stow_core::store::{
//!     FirstAvailableSelector, MemoryCredentialStore, MemoryDoorStore, MemorySessionStore,
//!     MemorySettingsStore, MemoryUserStore,
//! };
//! use stow_core::types::{ClientId, DoorId, SettingId, User, UserId};
//!
//! let doors = Arc::new(MemoryDoorStore::new());
//! let users = Arc::new(MemoryUserStore::new());
//! let settings = Arc::new(MemorySettingsStore::new());
//! users.insert(User {
//!     id: UserId::new("u1"),
//!     client_id: ClientId::new("c1"),
//!     full_name: "Avery Quinn".into(),
//!     is_active: true,
//! })?;
//! settings.insert_settings(ClientLockerSettings {
//!     id: SettingId::new("s1"),
//!     client_id: ClientId::new("c1"),
//!     allow_user_assignment: true,
//! })?;
//! doors.insert(LockerDoor::available(DoorId::new("d1"), ClientId::new("c1"), 1))?;
//!
//! let engine = LockerEngine::new(
//!     &EngineConfig::default(),
//!     EngineStores {
//!         doors: doors.clone(),
//!         sessions: Arc::new(MemorySessionStore::new()),
//!         credentials: Arc::new(MemoryCredentialStore::new()),
//!         settings,
//!         users: users.clone(),
//!         selector: Arc::new(FirstAvailableSelector::new(doors, users)),
//!         events: Arc::new(MemoryEventSink::new()),
//!         notifier: Arc::new(MemoryNotifier::new()),
//!     },
//! );
//!
//! let receipt = engine.assign_door(&DoorId::new("d1"), &UserId::new("u1"), None, None)?;
//! assert_eq!(receipt.door_id, DoorId::new("d1"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assignment;
pub mod config;
pub mod credential;
pub mod door;
pub mod engine;
pub mod error;
pub mod events;
pub mod policy;
pub mod session;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use engine::{EngineStores, LockerEngine};
pub use error::{EngineError, ErrorKind};
