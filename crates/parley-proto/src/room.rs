//! Room names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a chat room.
///
/// The shared room is always [`RoomId::GENERAL`]. Private rooms are named
/// after the pair of sessions in them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Name of the room every identified session joins.
    pub const GENERAL: &'static str = "general";

    /// The shared room.
    #[must_use]
    pub fn general() -> Self {
        Self(Self::GENERAL.to_owned())
    }

    /// Whether this is the shared room.
    #[must_use]
    pub fn is_general(&self) -> bool {
        self.0 == Self::GENERAL
    }

    /// Room name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_is_general() {
        assert!(RoomId::general().is_general());
        assert!(RoomId::from("general").is_general());
        assert!(!RoomId::from("1-2").is_general());
    }

    #[test]
    fn serializes_as_plain_string() {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&RoomId::from("3-7"), &mut buf).expect("encode");

        let text: String = ciborium::de::from_reader(buf.as_slice()).expect("decode");
        assert_eq!(text, "3-7");
    }
}
