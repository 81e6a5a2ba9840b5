//! Shared identifier and principal types.
//!
//! Identifiers are opaque strings minted by the provisioning layer; the
//! engine never parses them, it only routes them between stores.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id! {
    /// Identifier of a single locker door.
    DoorId
}

string_id! {
    /// Identifier of a user within a client organization.
    UserId
}

string_id! {
    /// Identifier of a client organization.
    ClientId
}

string_id! {
    /// Identifier of a client's locker-settings row.
    SettingId
}

/// A user as seen by the engine: enough to authorize door actions.
///
/// The full roster (email, phone, department) lives with the provisioning
/// layer and is not consumed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user's identifier.
    pub id: UserId,
    /// The client organization the user belongs to.
    pub client_id: ClientId,
    /// Display name, echoed back by credential verification.
    pub full_name: String,
    /// Inactive users are denied every door action.
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips_through_display() {
        let id = DoorId::new("door-7");
        assert_eq!(id.as_str(), "door-7");
        assert_eq!(id.to_string(), "door-7");
    }

    #[test]
    fn ids_of_equal_content_compare_equal() {
        assert_eq!(UserId::from("u1"), UserId::new(String::from("u1")));
    }
}
