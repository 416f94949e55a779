//! Visibility policy evaluation.
//!
//! An object is visible to a caller when the caller's entitlements
//! satisfy every restriction the object declares. The rules run in a
//! fixed order and stop at the first failure:
//!
//! 1. **Classification** (hierarchy): caller must hold every label.
//! 2. **Need-to-know** (all-of): caller must hold every label.
//! 3. **Releasable-to** (any-of): caller must hold at least one label.
//!
//! An empty field places no restriction. Swapping all-of and any-of
//! between the fields changes what leaks, so the order and the
//! quantifiers here must not drift.

use cop_relay_core::{EntitlementSet, Labeled, VisibilityAttributes};
use tracing::{debug, warn};

use crate::error::{PermsError, Result};

/// The rule that hid an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Classification,
    NeedToKnow,
    ReleasableTo,
}

/// Outcome of evaluating one object against one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Visible,
    Hidden(Rule),
}

impl Decision {
    pub fn is_visible(&self) -> bool {
        matches!(self, Decision::Visible)
    }
}

/// Evaluate the three rules in order.
pub fn evaluate(attrs: &VisibilityAttributes, entitlements: &EntitlementSet) -> Decision {
    if !attrs.classification.is_empty() && !entitlements.contains_all(&attrs.classification) {
        return Decision::Hidden(Rule::Classification);
    }

    if !attrs.need_to_know.is_empty() && !entitlements.contains_all(&attrs.need_to_know) {
        return Decision::Hidden(Rule::NeedToKnow);
    }

    if !attrs.releasable_to.is_empty() && !entitlements.contains_any(&attrs.releasable_to) {
        return Decision::Hidden(Rule::ReleasableTo);
    }

    Decision::Visible
}

/// Whether an object with `attrs` is visible to a caller holding
/// `entitlements`.
pub fn is_visible(attrs: &VisibilityAttributes, entitlements: &EntitlementSet) -> bool {
    evaluate(attrs, entitlements).is_visible()
}

/// Decode a raw search-attributes payload and evaluate it.
///
/// A record without search attributes (absent or an empty column) is
/// visible. A payload that cannot be decoded is an error; callers decide
/// whether that drops the record.
pub fn check_search(search: Option<&[u8]>, entitlements: &EntitlementSet) -> Result<bool> {
    let raw = match search {
        None => return Ok(true),
        Some(raw) if raw.is_empty() => return Ok(true),
        Some(raw) => raw,
    };
    let attrs = VisibilityAttributes::from_search(raw)
        .map_err(|e| PermsError::MalformedAttributes(e.to_string()))?;
    Ok(is_visible(&attrs, entitlements))
}

/// Keep only the records the caller may see, with search attributes
/// stripped from every record that is kept.
///
/// Records whose search attributes cannot be decoded are dropped and
/// logged; one bad record never fails the batch.
pub fn filter_visible<T: Labeled>(records: Vec<T>, entitlements: &EntitlementSet) -> Vec<T> {
    let total = records.len();
    let mut kept = Vec::with_capacity(total);

    for mut record in records {
        let visible = match record.visibility() {
            Ok(None) => true,
            Ok(Some(attrs)) => is_visible(&attrs, entitlements),
            Err(e) => {
                warn!(error = %e, "dropping record with unreadable search attributes");
                continue;
            }
        };
        if visible {
            record.strip_search();
            kept.push(record);
        }
    }

    debug!(total, visible = kept.len(), "visibility filter applied");
    kept
}

/// Strip search attributes from every record without filtering.
pub fn redact_all<T: Labeled>(records: &mut [T]) {
    for record in records {
        record.strip_search();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::NaiveDate;
    use cop_relay_core::{ObjectId, TdfObject};

    fn attrs(c: &[&str], n: &[&str], r: &[&str]) -> VisibilityAttributes {
        VisibilityAttributes {
            classification: c.iter().map(|s| s.to_string()).collect(),
            need_to_know: n.iter().map(|s| s.to_string()).collect(),
            releasable_to: r.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ents(labels: &[&str]) -> EntitlementSet {
        labels.iter().copied().collect()
    }

    fn object(search: Option<&str>) -> TdfObject {
        TdfObject {
            id: ObjectId::random(),
            ts: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            source_type: "reports".into(),
            geometry: None,
            search: search.map(|s| Bytes::copy_from_slice(s.as_bytes())),
            content: Bytes::from_static(b"blob"),
            uri: None,
        }
    }

    #[test]
    fn test_unrestricted_is_visible_to_anyone() {
        assert!(is_visible(&attrs(&[], &[], &[]), &ents(&[])));
    }

    #[test]
    fn test_classification_requires_all() {
        let a = attrs(&["secret", "topsecret"], &[], &[]);
        assert_eq!(
            evaluate(&a, &ents(&["secret"])),
            Decision::Hidden(Rule::Classification)
        );
        assert!(is_visible(&a, &ents(&["secret", "topsecret"])));
    }

    #[test]
    fn test_need_to_know_requires_all() {
        let a = attrs(&[], &["alpha", "bravo"], &[]);
        assert_eq!(
            evaluate(&a, &ents(&["alpha"])),
            Decision::Hidden(Rule::NeedToKnow)
        );
        assert!(is_visible(&a, &ents(&["alpha", "bravo", "extra"])));
    }

    #[test]
    fn test_releasable_to_requires_any() {
        let a = attrs(&[], &[], &["usa", "gbr"]);
        assert!(is_visible(&a, &ents(&["gbr"])));
        assert_eq!(
            evaluate(&a, &ents(&["fra"])),
            Decision::Hidden(Rule::ReleasableTo)
        );
    }

    #[test]
    fn test_rules_short_circuit_in_order() {
        let a = attrs(&["secret"], &["alpha"], &["usa"]);
        assert_eq!(evaluate(&a, &ents(&[])), Decision::Hidden(Rule::Classification));
        assert_eq!(
            evaluate(&a, &ents(&["secret"])),
            Decision::Hidden(Rule::NeedToKnow)
        );
        assert_eq!(
            evaluate(&a, &ents(&["secret", "alpha"])),
            Decision::Hidden(Rule::ReleasableTo)
        );
        assert!(is_visible(&a, &ents(&["secret", "alpha", "usa"])));
    }

    #[test]
    fn test_check_search() {
        let e = ents(&["usa"]);
        assert!(check_search(None, &e).unwrap());
        assert!(check_search(Some(b"null"), &e).unwrap());
        assert!(check_search(Some(br#"{"attrRelTo":"usa"}"#), &e).unwrap());
        assert!(!check_search(Some(br#"{"attrRelTo":"fra"}"#), &e).unwrap());
        assert!(matches!(
            check_search(Some(b"{broken"), &e),
            Err(PermsError::MalformedAttributes(_))
        ));
    }

    #[test]
    fn test_check_search_empty_column_is_unrestricted() {
        assert!(check_search(Some(b""), &ents(&[])).unwrap());
    }

    #[test]
    fn test_check_search_rejects_non_object_documents() {
        let empty = ents(&[]);
        let cases: [&[u8]; 5] = [b"[]", b"[[],[],[]]", br#"[["x"]]"#, br#""usa""#, b"true"];
        for raw in cases {
            assert!(
                matches!(
                    check_search(Some(raw), &empty),
                    Err(PermsError::MalformedAttributes(_))
                ),
                "accepted {}",
                String::from_utf8_lossy(raw)
            );
        }
        assert!(!check_search(Some(br#"{"attrClassification":"secret"}"#), &empty).unwrap());
    }

    #[test]
    fn test_filter_drops_array_search() {
        let records = vec![object(Some("[]")), object(Some("[[],[],[]]")), object(Some(""))];
        let kept = filter_visible(records, &ents(&[]));
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_filter_drops_hidden_and_malformed_and_strips_search() {
        let records = vec![
            object(None),
            object(Some(r#"{"attrClassification":"secret"}"#)),
            object(Some(r#"{"attrClassification":"unclassified"}"#)),
            object(Some("{broken")),
        ];
        let visible_id = records[2].id;

        let kept = filter_visible(records, &ents(&["unclassified"]));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].id, visible_id);
        assert!(kept.iter().all(|o| o.search.is_none()));
    }

    #[test]
    fn test_redact_all() {
        let mut records = vec![object(Some("{}")), object(Some("{broken"))];
        redact_all(&mut records);
        assert!(records.iter().all(|o| o.search.is_none()));
    }
}
