//! Property tests for the visibility policy.

use proptest::prelude::*;

use cop_relay_core::{EntitlementSet, Labeled, VisibilityAttributes};
use cop_relay_perms::{check_search, evaluate, filter_visible, is_visible, Decision, Rule};
use cop_relay_testkit::fixtures::ObjectBuilder;
use cop_relay_testkit::generators::{
    entitlement_set, label_set, non_empty_label_set, search_json, visibility_attributes,
};

fn holds_all(entitlements: &EntitlementSet, labels: &[String]) -> bool {
    labels.iter().all(|l| entitlements.contains(l))
}

fn holds_any(entitlements: &EntitlementSet, labels: &[String]) -> bool {
    labels.iter().any(|l| entitlements.contains(l))
}

proptest! {
    #[test]
    fn unrestricted_is_always_visible(entitlements in entitlement_set()) {
        prop_assert!(is_visible(&VisibilityAttributes::default(), &entitlements));
    }

    #[test]
    fn classification_requires_superset(
        classification in non_empty_label_set(4),
        entitlements in entitlement_set(),
    ) {
        let attrs = VisibilityAttributes {
            classification: classification.clone(),
            ..Default::default()
        };
        prop_assert_eq!(
            is_visible(&attrs, &entitlements),
            holds_all(&entitlements, &classification)
        );
    }

    #[test]
    fn releasable_to_requires_intersection(
        releasable_to in non_empty_label_set(4),
        entitlements in entitlement_set(),
    ) {
        let attrs = VisibilityAttributes {
            releasable_to: releasable_to.clone(),
            ..Default::default()
        };
        prop_assert_eq!(
            is_visible(&attrs, &entitlements),
            holds_any(&entitlements, &releasable_to)
        );
    }

    #[test]
    fn releasable_to_single_label_suffices(releasable_to in non_empty_label_set(4), pick in any::<prop::sample::Index>()) {
        let held = releasable_to[pick.index(releasable_to.len())].clone();
        let entitlements: EntitlementSet = [held].into_iter().collect();
        let attrs = VisibilityAttributes {
            releasable_to,
            ..Default::default()
        };
        prop_assert!(is_visible(&attrs, &entitlements));
    }

    #[test]
    fn rules_combine_all_all_any(
        attrs in visibility_attributes(),
        entitlements in entitlement_set(),
    ) {
        let expected = holds_all(&entitlements, &attrs.classification)
            && holds_all(&entitlements, &attrs.need_to_know)
            && (attrs.releasable_to.is_empty() || holds_any(&entitlements, &attrs.releasable_to));
        prop_assert_eq!(is_visible(&attrs, &entitlements), expected);
    }

    #[test]
    fn first_failing_rule_is_reported(
        attrs in visibility_attributes(),
        entitlements in entitlement_set(),
    ) {
        let expected = if !holds_all(&entitlements, &attrs.classification) {
            Decision::Hidden(Rule::Classification)
        } else if !holds_all(&entitlements, &attrs.need_to_know) {
            Decision::Hidden(Rule::NeedToKnow)
        } else if !attrs.releasable_to.is_empty() && !holds_any(&entitlements, &attrs.releasable_to) {
            Decision::Hidden(Rule::ReleasableTo)
        } else {
            Decision::Visible
        };
        prop_assert_eq!(evaluate(&attrs, &entitlements), expected);
    }

    #[test]
    fn more_entitlements_never_hide_under_all_of(
        classification in label_set(3),
        need_to_know in label_set(3),
        entitlements in entitlement_set(),
        extra in label_set(3),
    ) {
        let attrs = VisibilityAttributes { classification, need_to_know, releasable_to: Vec::new() };
        let wider: EntitlementSet = entitlements
            .iter()
            .map(str::to_string)
            .chain(extra)
            .collect();
        if is_visible(&attrs, &entitlements) {
            prop_assert!(is_visible(&attrs, &wider));
        }
    }

    #[test]
    fn search_json_decodes_to_same_decision(
        (attrs, json) in search_json(),
        entitlements in entitlement_set(),
    ) {
        let raw = json.to_string();
        prop_assert_eq!(
            check_search(Some(raw.as_bytes()), &entitlements).unwrap(),
            is_visible(&attrs, &entitlements)
        );
    }

    #[test]
    fn filtered_objects_never_carry_search(
        (_, json) in search_json(),
        entitlements in entitlement_set(),
    ) {
        let objects = vec![
            ObjectBuilder::new("radar").search(json).build(),
            ObjectBuilder::new("radar").build(),
        ];
        let kept = filter_visible(objects, &entitlements);
        prop_assert!(!kept.is_empty());
        prop_assert!(kept.iter().all(|o| o.search_payload().is_none()));
    }
}
