//! C3-style linearization of entity hierarchies
//!
//! The linearization of an entity is the merge of one candidate list per
//! direct base (each base's own linearization, in declaration order),
//! headed by the entity itself. The merge repeatedly takes the first
//! candidate head that does not appear in the tail of any other list; if no
//! head qualifies while lists remain, the hierarchy is inconsistent.

use lattice_core::entity::EntityData;
use lattice_core::error::{LatticeError, Result};
use lattice_core::ident::EntityId;
use lattice_core::schema::Schema;
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// Compute the full linearization of an entity, head first
///
/// # Errors
///
/// Returns `LatticeError::Ordering` when the base graph is cyclic or admits
/// no consistent order.
pub fn linearize(schema: &Schema, id: EntityId) -> Result<Vec<EntityId>> {
    let mut visiting = HashSet::new();
    linearize_guarded(schema, id, &mut visiting)
}

/// Transitive ancestors in linearization order, self excluded
///
/// # Errors
///
/// Returns `LatticeError::Ordering` when the hierarchy is inconsistent.
pub fn ancestors(schema: &Schema, id: EntityId) -> Result<Vec<EntityId>> {
    let mut order = linearize(schema, id)?;
    order.remove(0);
    Ok(order)
}

fn linearize_guarded(
    schema: &Schema,
    id: EntityId,
    visiting: &mut HashSet<EntityId>,
) -> Result<Vec<EntityId>> {
    if !visiting.insert(id) {
        // the entity occurs on its own base path
        return Err(LatticeError::ordering(&schema.get(id)?.name));
    }

    let entity = schema.get(id)?;
    let mut candidates: Vec<VecDeque<EntityId>> = Vec::with_capacity(entity.bases.len() + 1);
    candidates.push(VecDeque::from([id]));
    for &base in &entity.bases {
        candidates.push(linearize_guarded(schema, base, visiting)?.into());
    }
    visiting.remove(&id);

    merge_order(entity, candidates)
}

fn merge_order(entity: &EntityData, mut lists: Vec<VecDeque<EntityId>>) -> Result<Vec<EntityId>> {
    let mut result = Vec::new();

    loop {
        lists.retain(|list| !list.is_empty());
        if lists.is_empty() {
            trace!(entity = %entity.name, len = result.len(), "linearized");
            return Ok(result);
        }

        let mut selected = None;
        for list in &lists {
            let head = list[0];
            let blocked = lists
                .iter()
                .any(|other| other.iter().skip(1).any(|&candidate| candidate == head));
            if !blocked {
                selected = Some(head);
                break;
            }
        }

        let Some(head) = selected else {
            return Err(LatticeError::ordering(&entity.name));
        };

        result.push(head);
        for list in &mut lists {
            if list.front() == Some(&head) {
                list.pop_front();
            }
        }
    }
}

/// Whether `id` is `parent` or inherits from it
///
/// # Errors
///
/// Propagates linearization failures.
pub fn is_subclass(schema: &Schema, id: EntityId, parent: EntityId) -> Result<bool> {
    if id == parent {
        return Ok(true);
    }
    Ok(linearize(schema, id)?.contains(&parent))
}

/// Whether `id` inherits from any of `parents`
///
/// # Errors
///
/// Propagates linearization failures.
pub fn is_subclass_of_any(schema: &Schema, id: EntityId, parents: &[EntityId]) -> Result<bool> {
    let order = linearize(schema, id)?;
    Ok(parents.iter().any(|parent| order.contains(parent)))
}

/// The topmost non-abstract entity on the linearization path, self included
///
/// # Errors
///
/// Returns `LatticeError::MissingRoot` when every entity on the path is
/// abstract.
pub fn topmost_concrete_base(schema: &Schema, id: EntityId) -> Result<EntityId> {
    for &ancestor in linearize(schema, id)?.iter().rev() {
        if !schema.get(ancestor)?.is_abstract {
            return Ok(ancestor);
        }
    }
    Err(LatticeError::missing_root(&schema.get(id)?.name))
}

/// Walk `derived_from` links to the first non-derived entity
///
/// # Errors
///
/// Returns `LatticeError::NotFound` for a dangling derivation link.
pub fn nearest_non_derived_parent(schema: &Schema, id: EntityId) -> Result<EntityId> {
    let mut current = schema.get(id)?;
    while let Some(from) = current.derived_from {
        current = schema.get(from)?;
    }
    Ok(current.id)
}
