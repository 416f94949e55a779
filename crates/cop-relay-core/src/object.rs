//! TDF objects and notes.
//!
//! The store keeps opaque encrypted blobs alongside a little plaintext
//! metadata: when the object was observed, what kind of source produced
//! it, where it is, and the search attributes that govern who may see it.

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::attributes::VisibilityAttributes;
use crate::error::CoreError;
use crate::geometry::Geometry;
use crate::types::ObjectId;

/// A stored TDF object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdfObject {
    pub id: ObjectId,
    /// Observation time, whole seconds, no zone.
    pub ts: NaiveDateTime,
    /// Tag naming the producer/schema of the object.
    pub source_type: String,
    pub geometry: Option<Geometry>,
    /// Raw search-attributes JSON, exactly as stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Bytes>,
    /// Encrypted content; never inspected here.
    pub content: Bytes,
    pub uri: Option<String>,
}

/// One externally observed insert, as delivered on the notification
/// channel. It is the inserted object itself.
pub type ChangeEvent = TdfObject;

/// A note attached to a parent object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdfNote {
    pub id: ObjectId,
    pub ts: NaiveDateTime,
    pub parent_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Bytes>,
    pub content: Bytes,
    pub uri: Option<String>,
}

/// Anything that carries a search-attributes payload.
///
/// Implemented by every record type that can leave the relay, so
/// visibility filtering and stripping work the same for all of them.
pub trait Labeled {
    /// The raw search-attributes payload, if any.
    fn search_payload(&self) -> Option<&[u8]>;

    /// Drop the search-attributes payload.
    fn strip_search(&mut self);

    /// Decode the search-attributes payload.
    ///
    /// Returns `Ok(None)` when the record carries none; an empty payload
    /// counts as none.
    fn visibility(&self) -> Result<Option<VisibilityAttributes>, CoreError> {
        self.search_payload()
            .filter(|raw| !raw.is_empty())
            .map(VisibilityAttributes::from_search)
            .transpose()
    }
}

impl Labeled for TdfObject {
    fn search_payload(&self) -> Option<&[u8]> {
        self.search.as_deref()
    }

    fn strip_search(&mut self) {
        self.search = None;
    }
}

impl Labeled for TdfNote {
    fn search_payload(&self) -> Option<&[u8]> {
        self.search.as_deref()
    }

    fn strip_search(&mut self) {
        self.search = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(search: Option<&str>) -> TdfObject {
        TdfObject {
            id: ObjectId::random(),
            ts: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            source_type: "vehicles".into(),
            geometry: None,
            search: search.map(|s| Bytes::copy_from_slice(s.as_bytes())),
            content: Bytes::from_static(b"ciphertext"),
            uri: None,
        }
    }

    #[test]
    fn test_visibility_absent() {
        assert!(sample(None).visibility().unwrap().is_none());
    }

    #[test]
    fn test_visibility_decoded() {
        let obj = sample(Some(r#"{"attrRelTo":["usa"]}"#));
        let attrs = obj.visibility().unwrap().unwrap();
        assert_eq!(attrs.releasable_to, vec!["usa"]);
    }

    #[test]
    fn test_visibility_malformed() {
        let obj = sample(Some("{oops"));
        assert!(obj.visibility().is_err());
    }

    #[test]
    fn test_visibility_empty_column_is_absent() {
        assert!(sample(Some("")).visibility().unwrap().is_none());
    }
}
