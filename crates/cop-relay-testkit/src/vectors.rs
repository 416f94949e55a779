//! Notification payload vectors.
//!
//! Literal payloads as the store's trigger emits them, with the outcome
//! the parser must produce. Shared by unit and integration tests so every
//! consumer of the feed agrees on the same cases.

use cop_relay_core::parse_notification;

/// What parsing a vector must produce.
#[derive(Debug, Clone)]
pub enum Expected {
    Parsed {
        id: &'static str,
        ts: &'static str,
        source_type: &'static str,
        content: &'static [u8],
        has_geometry: bool,
        has_search: bool,
        uri: Option<&'static str>,
    },
    Rejected,
}

/// A payload vector.
#[derive(Debug, Clone)]
pub struct NotificationVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub payload: &'static str,
    pub expected: Expected,
}

const ID: &str = "3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c";

/// Get all notification vectors.
pub fn all_vectors() -> Vec<NotificationVector> {
    vec![
        NotificationVector {
            name: "all optional fields null",
            payload: r#"{"id":"3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c","ts":"2024-01-01T00:00:00.123456","src_type":"test","geo":null,"search":null,"tdf_blob":"null","tdf_uri":null}"#,
            expected: Expected::Parsed {
                id: ID,
                ts: "2024-01-01T00:00:00",
                source_type: "test",
                content: b"",
                has_geometry: false,
                has_search: false,
                uri: None,
            },
        },
        NotificationVector {
            name: "hex-escaped blob",
            payload: r#"{"id":"3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c","ts":"2024-01-01T00:00:00.1","src_type":"test","geo":null,"search":null,"tdf_blob":"\\x68656c6c6f","tdf_uri":null}"#,
            expected: Expected::Parsed {
                id: ID,
                ts: "2024-01-01T00:00:00",
                source_type: "test",
                content: b"hello",
                has_geometry: false,
                has_search: false,
                uri: None,
            },
        },
        NotificationVector {
            name: "raw blob, point, search and uri",
            payload: r#"{"id":"3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c","ts":"2024-06-30T23:59:59","src_type":"radar","geo":{"type":"Point","coordinates":[12.5,41.9]},"search":{"attrClassification":["secret"]},"tdf_blob":"plain","tdf_uri":"s3://tdf/1"}"#,
            expected: Expected::Parsed {
                id: ID,
                ts: "2024-06-30T23:59:59",
                source_type: "radar",
                content: b"plain",
                has_geometry: true,
                has_search: true,
                uri: Some("s3://tdf/1"),
            },
        },
        NotificationVector {
            name: "optional fields absent",
            payload: r#"{"id":"3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c","ts":"2024-01-01T12:00:00.5","src_type":"test"}"#,
            expected: Expected::Parsed {
                id: ID,
                ts: "2024-01-01T12:00:00",
                source_type: "test",
                content: b"",
                has_geometry: false,
                has_search: false,
                uri: None,
            },
        },
        NotificationVector {
            name: "not json",
            payload: "{not json",
            expected: Expected::Rejected,
        },
        NotificationVector {
            name: "id is not a uuid",
            payload: r#"{"id":"42","ts":"2024-01-01T00:00:00","src_type":"test"}"#,
            expected: Expected::Rejected,
        },
        NotificationVector {
            name: "timestamp in the wrong layout",
            payload: r#"{"id":"3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c","ts":"01/01/2024","src_type":"test"}"#,
            expected: Expected::Rejected,
        },
        NotificationVector {
            name: "source type missing",
            payload: r#"{"id":"3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c","ts":"2024-01-01T00:00:00"}"#,
            expected: Expected::Rejected,
        },
        NotificationVector {
            name: "bad hex after escape marker",
            payload: r#"{"id":"3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c","ts":"2024-01-01T00:00:00","src_type":"test","tdf_blob":"\\xzz"}"#,
            expected: Expected::Rejected,
        },
        NotificationVector {
            name: "geometry of unknown type",
            payload: r#"{"id":"3f2b8c1a-7d4e-4f6a-9b0c-1d2e3f4a5b6c","ts":"2024-01-01T00:00:00","src_type":"test","geo":{"type":"Circle","radius":3}}"#,
            expected: Expected::Rejected,
        },
    ]
}

/// Check one vector; returns a description of the first mismatch.
pub fn check_vector(vector: &NotificationVector) -> Result<(), String> {
    let parsed = parse_notification(vector.payload);
    match (&vector.expected, parsed) {
        (Expected::Rejected, Err(_)) => Ok(()),
        (Expected::Rejected, Ok(event)) => Err(format!("accepted as {}", event.id)),
        (Expected::Parsed { .. }, Err(e)) => Err(format!("rejected: {e}")),
        (
            Expected::Parsed {
                id,
                ts,
                source_type,
                content,
                has_geometry,
                has_search,
                uri,
            },
            Ok(event),
        ) => {
            let checks = [
                ("id", event.id.to_string() == *id),
                ("ts", event.ts.format("%Y-%m-%dT%H:%M:%S").to_string() == *ts),
                ("source_type", event.source_type == *source_type),
                ("content", &event.content[..] == *content),
                ("geometry", event.geometry.is_some() == *has_geometry),
                ("search", event.search.is_some() == *has_search),
                ("uri", event.uri.as_deref() == *uri),
            ];
            match checks.iter().find(|(_, ok)| !ok) {
                Some((field, _)) => Err(format!("{field} mismatch")),
                None => Ok(()),
            }
        }
    }
}

/// Check every vector. Returns `(name, passed, detail)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| match check_vector(v) {
            Ok(()) => (v.name.to_string(), true, String::new()),
            Err(detail) => (v.name.to_string(), false, detail),
        })
        .collect()
}
