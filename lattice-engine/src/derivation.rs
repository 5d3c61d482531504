//! Derivation factory for synthesized members
//!
//! Some merge outcomes need a new entity rather than a reference to an
//! existing one: materializing a delegated member on each inheritor, and
//! fusing divergent diamond branches into a single merged definition. Both
//! go through this module so derived entities carry a consistent shape
//! (owner backreference, derivation link, mangled name).

use crate::merge;
use lattice_core::config::EngineConfig;
use lattice_core::entity::EntityData;
use lattice_core::error::{LatticeError, Result};
use lattice_core::ident::EntityId;
use lattice_core::schema::Schema;
use tracing::debug;

/// Mangled name of a member derived for a specific owner
#[must_use]
pub fn derived_name(key: &str, owner_name: &str) -> String {
    format!("{key}@{owner_name}")
}

/// Materialize a per-owner copy of `source` under `owner`.
///
/// The copy keeps the source's collection key and inherits from the source,
/// so later merges see the source's definitions through the copy. Delegation
/// does not survive the copy: the materialized member holds its own state.
///
/// # Errors
///
/// Returns `LatticeError::Definition` when the copy would collide with its
/// own source, and propagates finalization failures.
pub fn derive_copy(
    schema: &Schema,
    source: EntityId,
    owner: EntityId,
    declared_inherited: bool,
    config: &EngineConfig,
) -> Result<(Schema, EntityId)> {
    let source_data = schema.get(source)?;
    let owner_data = schema.get(owner)?;

    let name = derived_name(source_data.refname(), &owner_data.name);
    if name == source_data.name {
        return Err(LatticeError::definition(format!(
            "cannot derive {name} from itself"
        )));
    }

    let mut data = source_data.clone();
    data.id = EntityId::default();
    data.name = name;
    data.shortname = Some(source_data.refname().to_string());
    data.owner = Some(owner);
    data.derived_from = Some(source);
    data.is_derived = true;
    data.declared_inherited = declared_inherited;
    data.delegated = false;
    data.bases = vec![source];
    data.ancestors.clear();

    let (next, copy) = schema.insert(data)?;
    debug!(source = %source_data.name, owner = %owner_data.name, "materialized derived copy");
    let next = merge::finalize_entity(&next, copy, Some(&[source]), config)?;
    Ok((next, copy))
}

/// Synthesize a merged member for `owner` inheriting from every diamond
/// branch in `merge_bases`.
///
/// The `exemplar` supplies the kind and shared shape of the new member; its
/// content is then resolved by finalizing against all branches, which
/// surfaces an ordering error if the branches cannot be reconciled.
///
/// # Errors
///
/// Returns `LatticeError::Definition` when the synthesized member would
/// collide with its own exemplar, and propagates insertion and finalization
/// failures.
pub fn derive_from_root(
    schema: &Schema,
    exemplar: EntityId,
    owner: EntityId,
    key: &str,
    merge_bases: &[EntityId],
    config: &EngineConfig,
) -> Result<(Schema, EntityId)> {
    let exemplar_data = schema.get(exemplar)?;
    let owner_data = schema.get(owner)?;

    let name = derived_name(key, &owner_data.name);
    if name == exemplar_data.name {
        return Err(LatticeError::definition(format!(
            "cannot derive {name} from itself"
        )));
    }

    let mut data = EntityData::new(name, exemplar_data.kind);
    data.shortname = Some(key.to_string());
    data.owner = Some(owner);
    data.derived_from = Some(exemplar);
    data.is_derived = true;
    data.declared_inherited = true;
    data.bases = merge_bases.to_vec();

    let (next, merged) = schema.insert(data)?;
    debug!(
        owner = %owner_data.name,
        key,
        branches = merge_bases.len(),
        "synthesized merged member"
    );
    let next = merge::finalize_entity(&next, merged, Some(merge_bases), config)?;
    Ok((next, merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_name() {
        assert_eq!(derived_name("friends", "default::User"), "friends@default::User");
    }
}
