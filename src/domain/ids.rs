//! Typed identifiers for the service's entities.
//!
//! Each id is a newtype around the string form stored in the database,
//! so a chair id cannot be passed where a ride id is expected. New ids
//! are random UUIDv4 strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mints a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Returns the id as a string slice.
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

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Identifier of a registered rider.
    UserId
);
string_id!(
    /// Identifier of a chair-fleet owner.
    OwnerId
);
string_id!(
    /// Identifier of a chair.
    ChairId
);
string_id!(
    /// Identifier of a ride request.
    RideId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_unique() {
        assert_ne!(RideId::generate(), RideId::generate());
    }

    #[test]
    fn serde_is_transparent() {
        let id = ChairId::from("abc");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some(r#""abc""#));
    }

    #[test]
    fn usable_as_map_key() {
        use std::collections::HashMap;
        let id = UserId::generate();
        let mut map = HashMap::new();
        map.insert(id.clone(), 1);
        assert_eq!(map.get(&id), Some(&1));
    }
}
