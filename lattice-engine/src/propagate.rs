//! Propagation of member additions and removals through the hierarchy
//!
//! Adding a member to an entity makes it visible on every descendant that
//! does not override it; removing one either uncovers the definition the
//! removed member was shadowing or disappears from the descendants' view.
//! Subtrees rooted at a local override are left untouched in both
//! directions.

use lattice_core::error::Result;
use lattice_core::ident::EntityId;
use lattice_core::refdict::RefDict;
use lattice_core::schema::Schema;
use tracing::debug;

/// Register a freshly created member on its owner and expose it to the
/// owner's descendants.
///
/// # Errors
///
/// Propagates lookup failures.
pub fn add_classref(
    schema: &Schema,
    owner: EntityId,
    refdict: &RefDict,
    member: EntityId,
) -> Result<Schema> {
    let mut schema = schema.clone();

    let mut member_data = schema.get(member)?.clone();
    let key = member_data.refname().to_string();
    if member_data.owner != Some(owner) {
        member_data.owner = Some(owner);
        schema = schema.update(member_data)?;
    }

    let mut owner_data = schema.get(owner)?.clone();
    {
        let coll = owner_data.collection_mut(refdict.collection);
        coll.local.insert(key.clone(), member);
        coll.full.insert(key.clone(), member);
    }
    schema = schema.update(owner_data)?;
    debug!(owner = %schema.get(owner)?.name, key, "registered member");

    expose_to_descendants(&schema, owner, refdict, &key, member)
}

fn expose_to_descendants(
    schema: &Schema,
    from: EntityId,
    refdict: &RefDict,
    key: &str,
    member: EntityId,
) -> Result<Schema> {
    let mut schema = schema.clone();
    for child in schema.children(from).to_vec() {
        let child_data = schema.get(child)?;
        if child_data
            .collection(refdict.collection)
            .is_some_and(|coll| coll.has_local(key))
        {
            // a local override shadows the new member for this subtree
            continue;
        }
        let mut data = child_data.clone();
        data.collection_mut(refdict.collection)
            .full
            .insert(key.to_string(), member);
        schema = schema.update(data)?;
        schema = expose_to_descendants(&schema, child, refdict, key, member)?;
    }
    Ok(schema)
}

/// Unregister a member from its owner and withdraw it from the descendants'
/// view, uncovering a definition inherited from the owner's bases when one
/// exists.
///
/// # Errors
///
/// Propagates lookup failures.
pub fn del_classref(
    schema: &Schema,
    owner: EntityId,
    refdict: &RefDict,
    key: &str,
) -> Result<Schema> {
    let mut schema = schema.clone();

    // the definition the removed member was shadowing, if any
    let owner_data = schema.get(owner)?;
    let mut fallback = None;
    for &base in &owner_data.bases {
        if let Some(&member) = schema
            .get(base)?
            .collection(refdict.collection)
            .and_then(|coll| coll.full.get(key))
        {
            fallback = Some(member);
            break;
        }
    }

    let mut data = owner_data.clone();
    {
        let coll = data.collection_mut(refdict.collection);
        coll.local.shift_remove(key);
        match fallback {
            Some(member) => {
                coll.full.insert(key.to_string(), member);
            }
            None => {
                coll.full.shift_remove(key);
            }
        }
    }
    schema = schema.update(data)?;
    debug!(owner = %schema.get(owner)?.name, key, uncovered = fallback.is_some(), "unregistered member");

    withdraw_from_descendants(&schema, owner, refdict, key, fallback)
}

fn withdraw_from_descendants(
    schema: &Schema,
    from: EntityId,
    refdict: &RefDict,
    key: &str,
    fallback: Option<EntityId>,
) -> Result<Schema> {
    let mut schema = schema.clone();
    for child in schema.children(from).to_vec() {
        let child_data = schema.get(child)?;
        if child_data
            .collection(refdict.collection)
            .is_some_and(|coll| coll.has_local(key))
        {
            continue;
        }
        let mut data = child_data.clone();
        {
            let coll = data.collection_mut(refdict.collection);
            match fallback {
                Some(member) => {
                    coll.full.insert(key.to_string(), member);
                }
                None => {
                    coll.full.shift_remove(key);
                }
            }
        }
        schema = schema.update(data)?;
        schema = withdraw_from_descendants(&schema, child, refdict, key, fallback)?;
    }
    Ok(schema)
}
