//! Visibility attributes and entitlement sets.
//!
//! An object's search attributes declare who may see it. A caller's
//! entitlements are the labels the authorization service says it holds.
//! Both sides are sets of opaque label strings (usually attribute value
//! FQNs); this module only decodes and carries them. Evaluation lives in
//! the permissions crate.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Decoded view of an object's search attributes.
///
/// Each field accepts either a single string or an array of strings in
/// the source JSON. An absent field, `null`, `""` and `[]` all decode to
/// an empty list, which means "no restriction of this kind".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityAttributes {
    /// Hierarchy labels; the caller must hold every one.
    #[serde(
        rename = "attrClassification",
        default,
        deserialize_with = "string_or_array",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub classification: Vec<String>,

    /// Need-to-know labels; the caller must hold every one.
    #[serde(
        rename = "attrNeedToKnow",
        default,
        deserialize_with = "string_or_array",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub need_to_know: Vec<String>,

    /// Releasable-to labels; the caller must hold at least one.
    #[serde(
        rename = "attrRelTo",
        default,
        deserialize_with = "string_or_array",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub releasable_to: Vec<String>,
}

impl VisibilityAttributes {
    /// Decode from a raw search-attributes payload.
    ///
    /// Members other than the three attribute fields are ignored. A JSON
    /// `null` document decodes to the unrestricted value; anything that is
    /// not an object (or null) is malformed.
    pub fn from_search(raw: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| CoreError::MalformedAttributes(e.to_string()))?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| CoreError::MalformedAttributes(e.to_string())),
            other => Err(CoreError::MalformedAttributes(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// True when no field carries a restriction.
    pub fn is_unrestricted(&self) -> bool {
        self.classification.is_empty()
            && self.need_to_know.is_empty()
            && self.releasable_to.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn string_or_array<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrArray {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<StringOrArray>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StringOrArray::One(s)) if s.is_empty() => Vec::new(),
        Some(StringOrArray::One(s)) => vec![s],
        Some(StringOrArray::Many(v)) => v,
    })
}

/// The set of labels a caller is entitled to.
///
/// Immutable once built and cheap to clone; a refreshed set replaces the
/// old one wholesale.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitlementSet(Arc<BTreeSet<String>>);

impl EntitlementSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the caller holds `label`.
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    /// Whether the caller holds every label in `labels`.
    pub fn contains_all<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        labels.iter().all(|l| self.contains(l.as_ref()))
    }

    /// Whether the caller holds at least one label in `labels`.
    pub fn contains_any<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        labels.iter().any(|l| self.contains(l.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Debug for EntitlementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl<S: Into<String>> FromIterator<S> for EntitlementSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().map(Into::into).collect()))
    }
}
