//! Anchored base-list edit scripts
//!
//! Base order affects linearization tie-breaks, so a position-insensitive
//! set diff is not enough: [`delta_bases`] produces the minimal set of
//! contiguous, anchored insertions (plus removals) that transforms one base
//! list into another while preserving the relative order of retained bases.

use crate::rebase::RebaseEntity;
use lattice_core::error::{LatticeError, Result};
use lattice_core::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Position marker for a group of added bases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Splice at the head of the base list
    First,
    /// Splice at the end of the base list
    Last,
    /// Splice immediately before the named existing base
    Before(String),
}

/// A contiguous run of added bases and where to splice it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedGroup {
    /// Bases to insert, in declared order
    pub bases: Vec<String>,
    /// Insertion anchor
    pub anchor: Anchor,
}

/// Minimal anchored edit script between two base lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDelta {
    /// Bases present in the old list but absent from the new one
    pub removed: Vec<String>,
    /// Insertion groups, in application order
    pub added: Vec<AddedGroup>,
}

impl BaseDelta {
    /// Whether the script carries no edits
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Compute the edit script transforming `old` into `new`
#[must_use]
pub fn delta_bases(old: &[String], new: &[String]) -> BaseDelta {
    let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();
    let removed: Vec<String> = old
        .iter()
        .filter(|base| !new_set.contains(base.as_str()))
        .cloned()
        .collect();
    let dropped: HashSet<&str> = removed.iter().map(String::as_str).collect();
    let common: Vec<String> = old
        .iter()
        .filter(|base| !dropped.contains(base.as_str()))
        .cloned()
        .collect();

    let mut added = Vec::new();
    let mut run: Vec<String> = Vec::new();
    let mut placed: HashSet<String> = HashSet::new();
    let mut next_common = 0;

    if !common.is_empty() {
        for base in new {
            if next_common < common.len() && *base == common[next_common] {
                if !run.is_empty() {
                    added.push(AddedGroup {
                        bases: std::mem::take(&mut run),
                        anchor: Anchor::Before(common[next_common].clone()),
                    });
                }
                next_common += 1;
                if next_common >= common.len() {
                    break;
                }
            } else {
                placed.insert(base.clone());
                run.push(base.clone());
            }
        }
    }

    // everything not yet placed goes to the end of the list
    let mut tail = run;
    tail.extend(
        new.iter()
            .filter(|base| !placed.contains(*base) && !common.contains(base))
            .cloned(),
    );
    if !tail.is_empty() {
        added.push(AddedGroup {
            bases: tail,
            anchor: Anchor::Last,
        });
    }

    BaseDelta { removed, added }
}

/// Apply an edit script to a base-name list.
///
/// A base named by a group that is already present is moved to the anchored
/// position rather than skipped, so pure reorders round-trip exactly.
///
/// # Errors
///
/// Returns `LatticeError::NotFound` when a `Before` anchor names a base that
/// is not in the list.
pub fn apply_to_names(old: &[String], delta: &BaseDelta) -> Result<Vec<String>> {
    let removed: HashSet<&str> = delta.removed.iter().map(String::as_str).collect();
    let mut bases: Vec<String> = old
        .iter()
        .filter(|base| !removed.contains(base.as_str()))
        .cloned()
        .collect();

    for group in &delta.added {
        let mut index = match &group.anchor {
            Anchor::First => 0,
            Anchor::Last => bases.len(),
            Anchor::Before(name) => bases
                .iter()
                .position(|base| base == name)
                .ok_or_else(|| LatticeError::not_found(name))?,
        };
        for base in &group.bases {
            if let Some(current) = bases.iter().position(|existing| existing == base) {
                bases.remove(current);
                if current < index {
                    index -= 1;
                }
            }
            bases.insert(index, base.clone());
            index += 1;
        }
    }

    Ok(bases)
}

/// Compare two versions of the same entity and emit a rebase operation when
/// their base-name sequences differ.
///
/// This is the engine's contribution to the schema diffing subsystem: the
/// returned operation is the only wire-visible artifact produced here.
///
/// # Errors
///
/// Returns `LatticeError::NotFound` when either schema version lacks the
/// entity.
pub fn delta_entity(
    old_schema: &Schema,
    new_schema: &Schema,
    name: &str,
) -> Result<Option<RebaseEntity>> {
    let old = old_schema.get_by_name(name)?;
    let new = new_schema.get_by_name(name)?;
    let old_bases = old_schema.base_names(old.id)?;
    let new_bases = new_schema.base_names(new.id)?;
    if old_bases == new_bases {
        return Ok(None);
    }
    let delta = delta_bases(&old_bases, &new_bases);
    Ok(Some(RebaseEntity::new(name, delta, new_bases)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_insert_before_anchor() {
        let delta = delta_bases(&names(&["A", "B", "C"]), &names(&["A", "D", "B", "C"]));
        assert!(delta.removed.is_empty());
        assert_eq!(
            delta.added,
            vec![AddedGroup {
                bases: names(&["D"]),
                anchor: Anchor::Before("B".into()),
            }]
        );
    }

    #[test]
    fn test_reorder_without_spurious_removals() {
        let delta = delta_bases(&names(&["A", "B"]), &names(&["B", "A"]));
        assert!(delta.removed.is_empty());
        for group in &delta.added {
            for base in &group.bases {
                assert!(!delta.removed.contains(base));
            }
        }
        let result = apply_to_names(&names(&["A", "B"]), &delta).expect("apply");
        assert_eq!(result, names(&["B", "A"]));
    }

    #[test]
    fn test_removal_and_tail() {
        let delta = delta_bases(&names(&["A", "B"]), &names(&["A", "C"]));
        assert_eq!(delta.removed, names(&["B"]));
        assert_eq!(
            delta.added,
            vec![AddedGroup {
                bases: names(&["C"]),
                anchor: Anchor::Last,
            }]
        );
        let result = apply_to_names(&names(&["A", "B"]), &delta).expect("apply");
        assert_eq!(result, names(&["A", "C"]));
    }

    #[test]
    fn test_disjoint_lists() {
        let delta = delta_bases(&names(&["A"]), &names(&["B", "C"]));
        assert_eq!(delta.removed, names(&["A"]));
        assert_eq!(
            delta.added,
            vec![AddedGroup {
                bases: names(&["B", "C"]),
                anchor: Anchor::Last,
            }]
        );
    }

    #[test]
    fn test_first_anchor_applies() {
        let delta = BaseDelta {
            removed: Vec::new(),
            added: vec![AddedGroup {
                bases: names(&["Z"]),
                anchor: Anchor::First,
            }],
        };
        let result = apply_to_names(&names(&["A", "B"]), &delta).expect("apply");
        assert_eq!(result, names(&["Z", "A", "B"]));
    }

    #[test]
    fn test_missing_anchor_is_error() {
        let delta = BaseDelta {
            removed: Vec::new(),
            added: vec![AddedGroup {
                bases: names(&["Z"]),
                anchor: Anchor::Before("missing".into()),
            }],
        };
        assert!(apply_to_names(&names(&["A"]), &delta).is_err());
    }
}
