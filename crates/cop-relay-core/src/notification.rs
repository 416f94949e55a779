//! Change notification payload parsing.
//!
//! The store's insert trigger publishes each new row as JSON on a
//! notification channel:
//!
//! ```text
//! {"id": "<uuid>", "ts": "2024-01-01T00:00:00.123456", "src_type": "...",
//!  "geo": {...}|null, "search": {...}|null, "tdf_blob": "\\x...", "tdf_uri": ...}
//! ```
//!
//! Binary columns arrive in the store's escaped hex form (`\x` followed by
//! hex digits). Fractional seconds arrive with inconsistent precision and
//! are truncated before parsing.

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::PayloadError;
use crate::geometry::Geometry;
use crate::object::ChangeEvent;
use crate::types::ObjectId;

/// Timestamp layout after fractional seconds are removed.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Marker the store prepends to hex-escaped binary values.
pub const HEX_ESCAPE: &str = "\\x";

#[derive(Debug, Deserialize)]
struct RawNotification {
    id: String,
    ts: String,
    src_type: String,
    #[serde(default)]
    geo: Option<serde_json::Value>,
    #[serde(default)]
    search: Option<Box<RawValue>>,
    #[serde(default)]
    tdf_blob: Option<String>,
    #[serde(default)]
    tdf_uri: Option<String>,
}

/// Parse one notification payload into a change event.
pub fn parse_notification(payload: &str) -> Result<ChangeEvent, PayloadError> {
    let raw: RawNotification = serde_json::from_str(payload)?;

    let id = ObjectId::parse(&raw.id).map_err(|e| PayloadError::InvalidId {
        value: raw.id.clone(),
        reason: e.to_string(),
    })?;

    let ts = parse_timestamp(&raw.ts)?;

    let geometry = match raw.geo {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(Geometry::from_value(value)?),
    };

    let search = raw
        .search
        .map(|r| Bytes::copy_from_slice(r.get().as_bytes()));

    let content = decode_content_blob(raw.tdf_blob.as_deref())?;

    Ok(ChangeEvent {
        id,
        ts,
        source_type: raw.src_type,
        geometry,
        search,
        content,
        uri: raw.tdf_uri,
    })
}

/// Parse a store timestamp, discarding any fractional seconds.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, PayloadError> {
    let whole = value.split_once('.').map_or(value, |(whole, _)| whole);
    NaiveDateTime::parse_from_str(whole, TIMESTAMP_FORMAT).map_err(|e| {
        PayloadError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Decode a `tdf_blob` value.
///
/// - absent, `""` and the literal `"null"` give an empty blob
/// - `\x`-prefixed values are hex-decoded
/// - anything else is taken as raw UTF-8 bytes
pub fn decode_content_blob(value: Option<&str>) -> Result<Bytes, PayloadError> {
    match value {
        None | Some("") | Some("null") => Ok(Bytes::new()),
        Some(v) => match v.strip_prefix(HEX_ESCAPE) {
            Some(digits) => hex::decode(digits)
                .map(Bytes::from)
                .map_err(|e| PayloadError::InvalidContentBlob(e.to_string())),
            None => Ok(Bytes::copy_from_slice(v.as_bytes())),
        },
    }
}
