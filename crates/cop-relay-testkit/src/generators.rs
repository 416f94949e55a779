//! Proptest generators for property-based testing.

use proptest::prelude::*;

use cop_relay_core::{EntitlementSet, VisibilityAttributes};

/// A short label drawn from a small alphabet, so generated sets overlap.
pub fn label() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

/// Distinct labels, up to `max` of them.
pub fn label_set(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(label(), 0..=max).prop_map(|s| s.into_iter().collect())
}

/// Distinct labels, at least one.
pub fn non_empty_label_set(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(label(), 1..=max.max(1)).prop_map(|s| s.into_iter().collect())
}

/// An entitlement set.
pub fn entitlement_set() -> impl Strategy<Value = EntitlementSet> {
    label_set(8).prop_map(|labels| labels.into_iter().collect())
}

/// Arbitrary visibility attributes.
pub fn visibility_attributes() -> impl Strategy<Value = VisibilityAttributes> {
    (label_set(3), label_set(3), label_set(3)).prop_map(
        |(classification, need_to_know, releasable_to)| VisibilityAttributes {
            classification,
            need_to_know,
            releasable_to,
        },
    )
}

/// Search attributes JSON built from the three label lists. Single
/// labels are sometimes written as a bare string, as the store allows.
pub fn search_json() -> impl Strategy<Value = (VisibilityAttributes, serde_json::Value)> {
    (visibility_attributes(), any::<bool>()).prop_map(|(attrs, bare)| {
        let field = |labels: &Vec<String>| {
            if bare && labels.len() == 1 {
                serde_json::json!(labels[0])
            } else {
                serde_json::json!(labels)
            }
        };
        let json = serde_json::json!({
            "attrClassification": field(&attrs.classification),
            "attrNeedToKnow": field(&attrs.need_to_know),
            "attrRelTo": field(&attrs.releasable_to),
        });
        (attrs, json)
    })
}
