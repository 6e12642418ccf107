//! Newtype identifiers for backend-issued references.
//!
//! The hosted backend hands out opaque string identifiers (usually UUIDs,
//! but the client never relies on that). Use the `define_string_id!` macro
//! to create wrappers that cannot be mixed up with each other.

/// Macro to define a type-safe string identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `new()`, `as_str()` and `into_inner()`
/// - `Display`, `AsRef<str>`, `From<String>` and `From<&str>`
///
/// # Example
///
/// ```rust
/// # use clubhub_core::define_string_id;
/// define_string_id!(ClubId);
/// define_string_id!(EventId);
///
/// let club = ClubId::new("c-1");
/// let event = EventId::new("c-1");
///
/// // Same text, different types, so this won't compile:
/// // let _: ClubId = event;
/// assert_eq!(club.as_str(), event.as_str());
/// ```
#[macro_export]
macro_rules! define_string_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

// Authenticated user, as issued by the backend auth subsystem.
define_string_id!(UserId);
// Row reference into the backend's role relation.
define_string_id!(RoleId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_display() {
        let id = UserId::new("u1");
        assert_eq!(id.to_string(), "u1");
        assert_eq!(id.as_str(), "u1");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = RoleId::from("r9");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"r9\"");

        let parsed: UserId =
            serde_json::from_str("\"0b6f6f3e-5a0d-4c1e-9d59-1b7c2f0e8a11\"").unwrap();
        assert_eq!(parsed.as_str(), "0b6f6f3e-5a0d-4c1e-9d59-1b7c2f0e8a11");
    }

    #[test]
    fn test_from_string_round_trips_inner() {
        let id = UserId::from(String::from("abc"));
        assert_eq!(id.into_inner(), "abc");
    }
}
