//! Identifier newtypes
//!
//! Every entity in the system is addressed by a dedicated newtype so that a
//! contest id can never be passed where a bot id is expected. Uuid-backed ids
//! are random (v4); `PresetId` and `InstanceId` are operator-chosen strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random id (UUID v4).
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from a string representation.
            ///
            /// Accepts standard UUID format. Returns `None` if the string is
            /// not a valid UUID.
            pub fn from_string(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map(Self)
            }

            /// Raw bytes of the underlying UUID.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a contest (a scheduled debate).
    ContestId
}

uuid_id! {
    /// Unique identifier for a registered bot.
    BotId
}

uuid_id! {
    /// Unique identifier for a user (bot owner or voter).
    UserId
}

uuid_id! {
    /// Unique identifier for a debate topic.
    TopicId
}

/// Identifier of a round preset, e.g. `classic`.
///
/// Presets are named by operators, so this is a string id rather than a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(String);

impl PresetId {
    /// Wrap a preset name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The preset name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PresetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of one platform instance.
///
/// Instances are replicas of the same service sharing a KV store and a
/// pub/sub bus. The id appears in ownership leases, attachment records, and
/// the per-instance bus channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap an instance name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The instance name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally-unique id correlating a bot request with its reply.
///
/// Format: `<instance>:<bot>:<unix-millis>:<counter>`. The instance scope plus
/// a per-instance monotonic counter makes collisions impossible without any
/// cross-instance coordination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Compose a request id from its parts.
    pub fn compose(instance: &InstanceId, bot: &BotId, unix_millis: i64, counter: u64) -> Self {
        Self(format!("{instance}:{bot}:{unix_millis}:{counter}"))
    }

    /// Wrap a raw request-id string received off the wire.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contest_id_roundtrip() {
        let id = ContestId::new();
        let parsed = ContestId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_from_string_rejects_garbage() {
        assert!(BotId::from_string("not-a-uuid").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ContestId::new(), ContestId::new());
        assert_ne!(BotId::new(), BotId::new());
    }

    #[test]
    fn test_request_id_compose() {
        let instance = InstanceId::new("inst-a");
        let bot = BotId::new();
        let id = RequestId::compose(&instance, &bot, 1_700_000_000_000, 7);
        let s = id.as_str();
        assert!(s.starts_with("inst-a:"));
        assert!(s.ends_with(":7"));
        assert!(s.contains(&bot.to_string()));
    }

    #[test]
    fn test_preset_id_display() {
        let id = PresetId::from("classic");
        assert_eq!(id.to_string(), "classic");
        assert_eq!(id.as_str(), "classic");
    }

    #[test]
    fn test_serde_transparent() {
        let id = ContestId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
