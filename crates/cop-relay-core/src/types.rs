//! Strong type definitions for the relay.
//!
//! Identifiers are newtypes to prevent mixing object and note ids with
//! arbitrary strings at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Identifier of a stored TDF object or note.
///
/// Assigned by the store when the row is inserted; this crate only parses
/// and carries it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the hyphenated (or simple) textual form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s.trim()).map(Self)
    }

    /// Get the inner UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The nil identifier (used as a sentinel).
    pub const NIL: Self = Self(Uuid::nil());
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_parse_display() {
        let text = "0b9c7e0e-5f43-4a7c-9a55-3b1f0d2c8e11";
        let id = ObjectId::parse(text).unwrap();
        assert_eq!(id.to_string(), text);
    }

    #[test]
    fn test_object_id_rejects_garbage() {
        assert!(ObjectId::parse("not-a-uuid").is_err());
        assert!(ObjectId::parse("").is_err());
    }

    #[test]
    fn test_object_id_debug() {
        let debug = format!("{:?}", ObjectId::NIL);
        assert!(debug.starts_with("ObjectId("));
    }

    #[test]
    fn test_object_id_serde_is_plain_string() {
        let id = ObjectId::random();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
