//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};

use cop_relay_core::{EntitlementSet, Geometry, ObjectId, TdfObject};

/// Midnight on 2024-01-01 plus `hours`.
pub fn timestamp(hours: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t + chrono::Duration::hours(hours as i64))
        .unwrap_or_default()
}

/// An entitlement set from string labels.
pub fn entitlements(labels: &[&str]) -> EntitlementSet {
    labels.iter().copied().collect()
}

/// Search attributes JSON in the store's layout.
pub fn search_attributes(classification: &[&str], need_to_know: &[&str], releasable_to: &[&str]) -> Value {
    let mut map = Map::new();
    if !classification.is_empty() {
        map.insert("attrClassification".into(), json!(classification));
    }
    if !need_to_know.is_empty() {
        map.insert("attrNeedToKnow".into(), json!(need_to_know));
    }
    if !releasable_to.is_empty() {
        map.insert("attrRelTo".into(), json!(releasable_to));
    }
    Value::Object(map)
}

/// Builder for stored objects.
#[derive(Debug, Clone)]
pub struct ObjectBuilder {
    object: TdfObject,
}

impl ObjectBuilder {
    pub fn new(source_type: &str) -> Self {
        Self {
            object: TdfObject {
                id: ObjectId::random(),
                ts: timestamp(0),
                source_type: source_type.to_string(),
                geometry: None,
                search: None,
                content: Bytes::from_static(b"tdf"),
                uri: None,
            },
        }
    }

    pub fn id(mut self, id: ObjectId) -> Self {
        self.object.id = id;
        self
    }

    pub fn at(mut self, ts: NaiveDateTime) -> Self {
        self.object.ts = ts;
        self
    }

    pub fn point(mut self, x: f64, y: f64) -> Self {
        self.object.geometry = Some(Geometry::Point {
            coordinates: vec![x, y],
        });
        self
    }

    pub fn search(mut self, search: Value) -> Self {
        self.object.search = Some(Bytes::from(search.to_string()));
        self
    }

    /// Raw search bytes, for malformed cases.
    pub fn raw_search(mut self, raw: &'static str) -> Self {
        self.object.search = Some(Bytes::from_static(raw.as_bytes()));
        self
    }

    pub fn classified(self, classification: &[&str]) -> Self {
        self.search(search_attributes(classification, &[], &[]))
    }

    pub fn content(mut self, content: &'static [u8]) -> Self {
        self.object.content = Bytes::from_static(content);
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.object.uri = Some(uri.to_string());
        self
    }

    pub fn build(self) -> TdfObject {
        self.object
    }
}

/// Builder for notification payloads as the store's trigger emits them.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    fields: Map<String, Value>,
}

impl PayloadBuilder {
    /// A valid payload with a random id and no optional fields.
    pub fn new() -> Self {
        let mut fields = Map::new();
        fields.insert("id".into(), json!(ObjectId::random().to_string()));
        fields.insert("ts".into(), json!("2024-01-01T00:00:00.123456"));
        fields.insert("src_type".into(), json!("test"));
        fields.insert("geo".into(), Value::Null);
        fields.insert("search".into(), Value::Null);
        fields.insert("tdf_blob".into(), json!("null"));
        fields.insert("tdf_uri".into(), Value::Null);
        Self { fields }
    }

    pub fn id(self, id: &str) -> Self {
        self.set("id", json!(id))
    }

    pub fn ts(self, ts: &str) -> Self {
        self.set("ts", json!(ts))
    }

    pub fn source_type(self, source_type: &str) -> Self {
        self.set("src_type", json!(source_type))
    }

    pub fn geo(self, geo: Value) -> Self {
        self.set("geo", geo)
    }

    pub fn search(self, search: Value) -> Self {
        self.set("search", search)
    }

    pub fn blob(self, blob: &str) -> Self {
        self.set("tdf_blob", json!(blob))
    }

    /// Blob in the store's `\x` hex-escaped form.
    pub fn hex_blob(self, bytes: &[u8]) -> Self {
        self.set("tdf_blob", json!(format!("\\x{}", hex::encode(bytes))))
    }

    pub fn uri(self, uri: &str) -> Self {
        self.set("tdf_uri", json!(uri))
    }

    /// Drop a field entirely.
    pub fn without(mut self, field: &str) -> Self {
        self.fields.remove(field);
        self
    }

    pub fn build(self) -> String {
        Value::Object(self.fields).to_string()
    }

    fn set(mut self, field: &str, value: Value) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cop_relay_core::{parse_notification, Labeled, VisibilityAttributes};

    #[test]
    fn test_payload_builder_parses() {
        let payload = PayloadBuilder::new()
            .source_type("radar")
            .hex_blob(b"hello")
            .uri("s3://bucket/key")
            .build();
        let event = parse_notification(&payload).unwrap();
        assert_eq!(event.source_type, "radar");
        assert_eq!(&event.content[..], b"hello");
        assert_eq!(event.uri.as_deref(), Some("s3://bucket/key"));
        assert_eq!(event.ts, timestamp(0));
    }

    #[test]
    fn test_object_builder_labels() {
        let object = ObjectBuilder::new("radar").classified(&["secret"]).build();
        let attrs = object.visibility().unwrap().unwrap();
        assert_eq!(
            attrs,
            VisibilityAttributes {
                classification: vec!["secret".into()],
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_search_attributes_skips_empty() {
        assert_eq!(search_attributes(&[], &[], &["usa"]), json!({"attrRelTo": ["usa"]}));
    }
}
