//! Anchored base-delta computation, application and serialization

mod common;

use common::{create_type, std_schema};
use lattice_engine::prelude::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(ToString::to_string).collect()
}

#[test]
fn test_pure_insertion_is_anchored() {
    let delta = delta_bases(&names(&["A", "B", "C"]), &names(&["A", "X", "Y", "B", "C"]));
    assert!(delta.removed.is_empty());
    assert_eq!(delta.added.len(), 1);
    assert_eq!(delta.added[0].bases, names(&["X", "Y"]));
    assert_eq!(delta.added[0].anchor, Anchor::Before("B".into()));
}

#[test]
fn test_empty_delta_for_identical_lists() {
    let delta = delta_bases(&names(&["A", "B"]), &names(&["A", "B"]));
    assert!(delta.is_empty());
    assert_eq!(
        apply_to_names(&names(&["A", "B"]), &delta).expect("apply"),
        names(&["A", "B"])
    );
}

#[test]
fn test_reorder_produces_no_removals() {
    let delta = delta_bases(&names(&["A", "B", "C"]), &names(&["C", "A", "B"]));
    assert!(delta.removed.is_empty());
    assert_eq!(
        apply_to_names(&names(&["A", "B", "C"]), &delta).expect("apply"),
        names(&["C", "A", "B"])
    );
}

#[test]
fn test_delta_survives_json() {
    let delta = delta_bases(&names(&["A", "B"]), &names(&["B", "C"]));
    let json = serde_json::to_string(&delta).expect("serialize");
    let back: BaseDelta = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, delta);
}

#[test]
fn test_delta_entity_emits_rebase_only_on_change() {
    let schema = std_schema();
    let (schema, _) = create_type(&schema, "default::A", &[]);
    let (schema, _) = create_type(&schema, "default::B", &[]);
    let (old, _) = create_type(&schema, "default::D", &["default::A"]);

    assert!(delta_entity(&old, &old, "default::D").expect("delta").is_none());

    let op = RebaseEntity::new(
        "default::D",
        delta_bases(&names(&["default::A"]), &names(&["default::B"])),
        names(&["default::B"]),
    );
    let new = op
        .apply(&old, &lattice_core::prelude::EngineConfig::default())
        .expect("rebase")
        .schema;

    let rebase = delta_entity(&old, &new, "default::D")
        .expect("delta")
        .expect("rebase op");
    assert_eq!(rebase.new_bases, names(&["default::B"]));
    assert_eq!(rebase.delta.removed, names(&["default::A"]));
}

/// Distinct base names drawn from a small pool, in random order
fn base_list() -> impl Strategy<Value = Vec<String>> {
    proptest::sample::subsequence(vec!["A", "B", "C", "D", "E", "F"], 0..=6)
        .prop_shuffle()
        .prop_map(|picked| picked.into_iter().map(ToString::to_string).collect())
}

proptest! {
    /// Applying the computed script to the old list always reproduces the
    /// new list exactly, including pure reorders.
    #[test]
    fn prop_delta_round_trips(old in base_list(), new in base_list()) {
        let delta = delta_bases(&old, &new);
        let result = apply_to_names(&old, &delta).expect("apply");
        prop_assert_eq!(result, new);
    }

    /// A base never appears as both removed and added in the same script.
    #[test]
    fn prop_removed_and_added_are_disjoint(old in base_list(), new in base_list()) {
        let delta = delta_bases(&old, &new);
        for group in &delta.added {
            for base in &group.bases {
                prop_assert!(!delta.removed.contains(base));
            }
        }
    }
}
