//! Reference-collection merging across inheritance
//!
//! For every reference collection an entity carries, the merge engine
//! reconciles locally declared members with the definitions exposed by the
//! entity's bases: reusing a single inherited definition by reference,
//! absorbing inherited definitions into a local override, or synthesizing a
//! merged definition when unrelated branches define the same name.

use crate::derivation;
use crate::linearize;
use lattice_core::config::EngineConfig;
use lattice_core::entity::RefCollection;
use lattice_core::error::{LatticeError, Result};
use lattice_core::ident::{EntityId, OriginKey};
use lattice_core::refdict::{RefDict, refdicts};
use lattice_core::schema::Schema;
use indexmap::IndexMap;
use tracing::{debug, trace};

/// The entity on the linearization path that actually defines `key` in the
/// given collection, if any.
///
/// A miss here is an expected signal: the rebase coordinator uses it to
/// prune references whose origin base was removed.
#[must_use]
pub fn classref_origin(
    schema: &Schema,
    id: EntityId,
    refdict: &RefDict,
    key: &str,
) -> Option<EntityId> {
    let entity = schema.entity(id)?;
    if entity
        .collection(refdict.collection)
        .is_some_and(|coll| coll.has_local(key))
    {
        return Some(id);
    }
    for &ancestor in &entity.ancestors {
        if let Some(data) = schema.entity(ancestor) {
            if data
                .collection(refdict.collection)
                .is_some_and(|coll| coll.has_local(key))
            {
                return Some(ancestor);
            }
        }
    }
    None
}

/// Coarse inheritance acquisition: union member references from `bases` into
/// the entity's full collections for keys it does not yet expose.
///
/// # Errors
///
/// Returns `LatticeError::NotFound` for unknown entities.
pub fn acquire_ancestor_inheritance(
    schema: &Schema,
    id: EntityId,
    bases: Option<&[EntityId]>,
) -> Result<Schema> {
    let entity = schema.get(id)?;
    let bases: Vec<EntityId> = bases.map_or_else(|| entity.bases.clone(), <[EntityId]>::to_vec);

    let mut data = entity.clone();
    let mut changed = false;
    for refdict in refdicts(entity.kind) {
        for &base in &bases {
            let base_data = schema.get(base)?;
            let Some(other) = base_data.collection(refdict.collection) else {
                continue;
            };
            for (key, &member) in &other.full {
                let coll = data.collection_mut(refdict.collection);
                if !coll.full.contains_key(key) {
                    coll.full.insert(key.clone(), member);
                    changed = true;
                }
            }
        }
    }

    if changed { schema.update(data) } else { Ok(schema.clone()) }
}

/// Recursively reacquire ancestor inheritance in every descendant
///
/// # Errors
///
/// Propagates lookup failures.
pub fn update_descendants(schema: &Schema, id: EntityId, config: &EngineConfig) -> Result<Schema> {
    let mut schema = schema.clone();
    for child in schema.children(id).to_vec() {
        schema = acquire_ancestor_inheritance(&schema, child, None)?;
        schema = update_descendants(&schema, child, config)?;
    }
    Ok(schema)
}

/// Refresh the entity's ancestor cache, reacquire inheritance and merge
/// every registered reference collection.
///
/// # Errors
///
/// Propagates linearization and merge failures.
pub fn finalize_entity(
    schema: &Schema,
    id: EntityId,
    bases: Option<&[EntityId]>,
    config: &EngineConfig,
) -> Result<Schema> {
    let mut schema = schema.clone();

    let entity = schema.get(id)?;
    if !entity.bases.is_empty() {
        let ancestors = linearize::ancestors(&schema, id)?;
        if ancestors != entity.ancestors {
            let mut data = entity.clone();
            data.ancestors = ancestors;
            schema = schema.update(data)?;
        }
    }

    schema = acquire_ancestor_inheritance(&schema, id, bases)?;

    let entity = schema.get(id)?;
    let kind = entity.kind;
    let bases: Vec<EntityId> = bases.map_or_else(|| entity.bases.clone(), <[EntityId]>::to_vec);
    for refdict in refdicts(kind) {
        schema = merge_classref_dict(&schema, id, refdict, &bases, None, config)?;
    }
    Ok(schema)
}

/// Merge one reference collection from `bases` into the entity.
///
/// `keys` restricts the merge to specific member names; by default every key
/// in the entity's current full collection is considered.
///
/// # Errors
///
/// Returns `LatticeError::Definition` for explicit-inherit violations and
/// propagates linearization failures from member finalization.
pub fn merge_classref_dict(
    schema: &Schema,
    id: EntityId,
    refdict: &RefDict,
    bases: &[EntityId],
    keys: Option<&[String]>,
    config: &EngineConfig,
) -> Result<Schema> {
    let mut schema = schema.clone();
    let owner_name = schema.get(id)?.name.clone();
    let mut coll = schema
        .get(id)?
        .collection(refdict.collection)
        .cloned()
        .unwrap_or_default();

    let keys: Vec<String> = keys.map_or_else(
        || coll.full.keys().cloned().collect(),
        <[String]>::to_vec,
    );

    let mut changed = false;
    for key in &keys {
        let local = coll.local.get(key).copied();

        // Collect inherited candidates from the direct bases, collapsed by
        // the identity of the defining owner: a member reachable through two
        // bases via a shared ancestor counts once.
        let mut ancestry: IndexMap<OriginKey, EntityId> = IndexMap::new();
        for &base in bases {
            let base_data = schema.get(base)?;
            let Some(base_coll) = base_data.collection(refdict.collection) else {
                continue;
            };
            if let Some(&member) = base_coll.full.get(key) {
                let member_data = schema.get(member)?;
                ancestry.insert(
                    OriginKey::for_member(member, member_data.owner),
                    member,
                );
            }
        }
        let inherited: Vec<EntityId> = ancestry.values().copied().collect();

        if inherited.is_empty() && local.is_none() {
            continue;
        }

        let mut pure_inheritance = false;
        let merged = if let Some(local_id) = local {
            if inherited.is_empty() {
                local_id
            } else {
                // the local override absorbs the inherited definitions
                let mut data = schema.get(local_id)?.clone();
                if data.bases != inherited {
                    data.bases = inherited.clone();
                    data.ancestors.clear();
                    schema = schema.update(data)?;
                }
                schema = finalize_entity(&schema, local_id, Some(&inherited), config)?;
                local_id
            }
        } else if inherited.len() > 1 {
            debug!(
                owner = %owner_name,
                key,
                branches = inherited.len(),
                "synthesizing merged definition for diamond"
            );
            let (next, merged) =
                derivation::derive_from_root(&schema, inherited[0], id, key, &inherited, config)?;
            schema = next;
            merged
        } else {
            let (next, merged, pure) = inherit_pure(&schema, inherited[0], id, config)?;
            schema = next;
            pure_inheritance = pure;
            merged
        };

        if let Some(local_id) = local {
            let local_data = schema.get(local_id)?;
            if !inherited.is_empty()
                && !pure_inheritance
                && refdict.requires_explicit_inherit
                && !local_data.declared_inherited
                && config.declarative
            {
                let ancestor_names: Vec<String> = ancestry
                    .keys()
                    .map(|origin| {
                        schema
                            .entity(origin.owner())
                            .map_or_else(|| origin.owner().to_string(), |data| data.name.clone())
                    })
                    .collect();
                return Err(LatticeError::definition_at(
                    format!(
                        "{owner_name}: {} must be declared using the `inherited` keyword \
                         because it is defined in the following ancestor(s): {}",
                        local_data.name,
                        ancestor_names.join(", ")
                    ),
                    local_data.source.clone(),
                ));
            }
            if inherited.is_empty() && local_data.declared_inherited {
                return Err(LatticeError::definition_at(
                    format!(
                        "{owner_name}: {} cannot be declared `inherited` as there are \
                         no ancestors defining it",
                        local_data.name
                    ),
                    local_data.source.clone(),
                ));
            }
        }

        if inherited.is_empty() {
            if coll.full.get(key) != Some(&merged) {
                coll.full.insert(key.clone(), merged);
                changed = true;
            }
        } else {
            if !pure_inheritance && coll.local.get(key) != Some(&merged) {
                coll.local.insert(key.clone(), merged);
                changed = true;
            }
            if coll.full.get(key) != Some(&merged) {
                coll.full.insert(key.clone(), merged);
                changed = true;
            }
        }
        trace!(owner = %owner_name, key, pure = pure_inheritance, "merged classref");
    }

    if changed {
        let mut data = schema.get(id)?.clone();
        data.collections
            .insert(refdict.collection.to_string(), coll);
        schema.update(data)
    } else {
        Ok(schema)
    }
}

/// Reuse an inherited member by reference, or materialize a per-owner copy
/// when the member carries state that cannot be shared (delegated
/// constraints). The returned flag reports whether sharing was pure.
fn inherit_pure(
    schema: &Schema,
    member: EntityId,
    owner: EntityId,
    config: &EngineConfig,
) -> Result<(Schema, EntityId, bool)> {
    let data = schema.get(member)?;
    if data.delegated {
        let (next, copy) = derivation::derive_copy(schema, member, owner, true, config)?;
        Ok((next, copy, false))
    } else {
        Ok((schema.clone(), member, true))
    }
}

/// Ensure every key exposed by a collection is either local or traceable to
/// a surviving ancestor, dropping the ones whose origin is gone.
///
/// # Errors
///
/// Propagates lookup failures for the entity itself.
pub fn prune_stale_refs(schema: &Schema, id: EntityId) -> Result<Schema> {
    let entity = schema.get(id)?;
    let mut data = entity.clone();
    let mut changed = false;

    for refdict in refdicts(entity.kind) {
        let Some(coll) = data.collections.get_mut(refdict.collection) else {
            continue;
        };
        let inherited_keys: Vec<String> = coll
            .full
            .keys()
            .filter(|key| !coll.local.contains_key(*key))
            .cloned()
            .collect();
        for key in inherited_keys {
            let member_alive = coll
                .full
                .get(&key)
                .and_then(|&member| schema.entity(member))
                .is_some();
            if !member_alive || classref_origin(schema, id, refdict, &key).is_none() {
                coll.full.shift_remove(&key);
                changed = true;
                debug!(entity = %entity.name, key, "pruned stale inherited reference");
            }
        }
    }

    if changed { schema.update(data) } else { Ok(schema.clone()) }
}

/// Check a collection invariant used by tests and debugging: every full key
/// is local or has a resolvable origin.
#[must_use]
pub fn collection_is_consistent(schema: &Schema, id: EntityId) -> bool {
    let Some(entity) = schema.entity(id) else {
        return false;
    };
    refdicts(entity.kind).iter().all(|refdict| {
        entity
            .collection(refdict.collection)
            .unwrap_or(&RefCollection::default())
            .full
            .keys()
            .all(|key| {
                entity
                    .collection(refdict.collection)
                    .is_some_and(|coll| coll.has_local(key))
                    || classref_origin(schema, id, refdict, key).is_some()
            })
    })
}
