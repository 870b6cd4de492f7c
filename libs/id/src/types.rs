//! Identifier definitions.

use std::fmt;

use crate::{define_id, IdError};

// =============================================================================
// Generated IDs
// =============================================================================

define_id!(NotificationId, "ntf");
define_id!(RequestId, "req");

// =============================================================================
// Identity
// =============================================================================

/// Opaque token identifying an observing actor.
///
/// Identities come from an external authentication layer, usually as a
/// numeric user id. They are compared and formatted, nothing else. Because
/// private channel names are `<base>.<identity>`, an identity may not contain
/// `.` or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(String);

impl Identity {
    /// Validates and wraps a textual identity.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(found) = s.chars().find(|c| *c == '.' || c.is_whitespace()) {
            return Err(IdError::InvalidCharacter {
                kind: "identity",
                found,
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Identity {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for Identity {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl serde::Serialize for Identity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Identity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct IdentityVisitor;

        impl serde::de::Visitor<'_> for IdentityVisitor {
            type Value = Identity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an identity string or integer")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Identity, E> {
                Ok(Identity::from(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Identity, E> {
                Ok(Identity::from(v))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Identity, E> {
                Identity::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(IdentityVisitor)
    }
}

// =============================================================================
// Socket ID
// =============================================================================

/// Transport connection token of the client that originated an action.
///
/// Pusher-compatible transports format these as `<digits>.<digits>`; the value
/// is passed through untouched, only emptiness and whitespace are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocketId(String);

impl SocketId {
    /// Validates and wraps a socket id.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(found) = s.chars().find(|c| c.is_whitespace()) {
            return Err(IdError::InvalidCharacter {
                kind: "socket id",
                found,
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Builds a `<major>.<minor>` id, the format Pusher servers hand out.
    pub fn from_parts(major: u64, minor: u64) -> Self {
        Self(format!("{major}.{minor}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SocketId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for SocketId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_notification_id_roundtrip() {
        let id = NotificationId::new();
        let s = id.to_string();
        assert!(s.starts_with("ntf_"));
        let parsed: NotificationId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_notification_id_invalid_prefix() {
        let result: Result<NotificationId, _> = "req_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(
            result.unwrap_err(),
            IdError::InvalidPrefix { expected: "ntf", .. }
        ));
    }

    #[test]
    fn test_notification_id_missing_separator() {
        let result: Result<NotificationId, _> = "ntf01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(result.unwrap_err(), IdError::MissingSeparator));
    }

    #[test]
    fn test_notification_id_invalid_ulid() {
        let result: Result<NotificationId, _> = "ntf_invalid".parse();
        assert!(matches!(result.unwrap_err(), IdError::InvalidUlid(_)));
    }

    #[test]
    fn test_notification_ids_never_repeat() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| NotificationId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_identity_from_integer() {
        assert_eq!(Identity::from(42i64).as_str(), "42");
        assert_eq!(Identity::from(42i64), "42".parse::<Identity>().unwrap());
    }

    #[test]
    fn test_identity_rejects_dots() {
        assert!(matches!(
            Identity::parse("4.2"),
            Err(IdError::InvalidCharacter { found: '.', .. })
        ));
        assert_eq!(Identity::parse(""), Err(IdError::Empty));
    }

    #[test]
    fn test_identity_deserializes_from_number_or_string() {
        let from_num: Identity = serde_json::from_str("42").unwrap();
        let from_str: Identity = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_num, from_str);
        assert_eq!(serde_json::to_string(&from_num).unwrap(), "\"42\"");
    }

    #[test]
    fn test_socket_id_trims() {
        let id = SocketId::parse(" 1234.5678 ").unwrap();
        assert_eq!(id.as_str(), "1234.5678");
        assert!(SocketId::parse("   ").is_err());
    }

    #[test]
    fn test_socket_id_from_parts() {
        let id = SocketId::from_parts(1234, 5678);
        assert_eq!(id, SocketId::parse("1234.5678").unwrap());
    }

    #[test]
    fn test_all_id_prefixes_unique() {
        assert_ne!(NotificationId::PREFIX, RequestId::PREFIX);
    }

    proptest! {
        #[test]
        fn prop_distinct_numeric_identities_differ(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            prop_assert_ne!(Identity::from(a), Identity::from(b));
        }

        #[test]
        fn prop_identity_parse_display_roundtrip(s in "[A-Za-z0-9_-]{1,32}") {
            let id = Identity::parse(&s).unwrap();
            prop_assert_eq!(id.to_string(), s);
        }
    }
}
