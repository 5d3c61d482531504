//! Schema mutation commands and lifecycle hook dispatch
//!
//! All schema changes flow through [`Command`]: entity-level create, alter,
//! rebase and delete plus member-level create, alter and delete for entries
//! of reference collections. Each entity kind resolves to a static
//! [`LifecycleHooks`] table; referenced kinds extend the inheriting hooks
//! with owner-collection registration and descendant propagation.

use crate::derivation;
use crate::linearize;
use crate::merge;
use crate::propagate;
use crate::rebase::RebaseEntity;
use lattice_core::config::EngineConfig;
use lattice_core::entity::EntityData;
use lattice_core::error::{LatticeError, Result};
use lattice_core::ident::EntityId;
use lattice_core::refdict::{EntityKind, RefDict, refdict, refdict_for_member};
use lattice_core::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A single schema mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Create a top-level entity
    CreateEntity(CreateEntity),
    /// Alter a top-level entity's flags or cached ancestry
    AlterEntity(AlterEntity),
    /// Replace an entity's base list and cascade to its subclasses
    RebaseEntity(RebaseEntity),
    /// Delete a top-level entity and its owned members
    DeleteEntity(DeleteEntity),
    /// Create a member in a reference collection
    CreateMember(CreateMember),
    /// Alter a collection member, materializing it if inherited
    AlterMember(AlterMember),
    /// Delete a locally declared collection member
    DeleteMember(DeleteMember),
}

/// Result of applying one command
#[derive(Debug)]
pub struct CommandOutcome {
    /// Schema version with the command applied
    pub schema: Schema,
    /// The entity the command resolved to (created, altered or deleted)
    pub entity: EntityId,
    /// Operations the engine performed implicitly on the caller's behalf
    pub synthesized: Vec<Command>,
}

impl Command {
    /// Apply the command to a schema version.
    ///
    /// # Errors
    ///
    /// Propagates resolution, validation and linearization failures from the
    /// underlying operation.
    pub fn apply(&self, schema: &Schema, config: &EngineConfig) -> Result<CommandOutcome> {
        match self {
            Self::CreateEntity(op) => op.apply(schema, config),
            Self::AlterEntity(op) => {
                let next = op.apply(schema, config)?;
                let entity = next.get_by_name(&op.name)?.id;
                Ok(CommandOutcome {
                    schema: next,
                    entity,
                    synthesized: Vec::new(),
                })
            }
            Self::RebaseEntity(op) => {
                let outcome = op.apply(schema, config)?;
                Ok(CommandOutcome {
                    schema: outcome.schema,
                    entity: outcome.entity,
                    synthesized: outcome
                        .synthesized
                        .into_iter()
                        .map(Command::AlterEntity)
                        .collect(),
                })
            }
            Self::DeleteEntity(op) => op.apply(schema, config),
            Self::CreateMember(op) => op.apply(schema, config),
            Self::AlterMember(op) => op.apply(schema, config),
            Self::DeleteMember(op) => op.apply(schema, config),
        }
    }
}

/// Lifecycle hook: takes a schema version, the entity being processed and
/// the engine configuration, returns the next version.
pub type HookFn = fn(&Schema, EntityId, &EngineConfig) -> Result<Schema>;

/// Per-kind lifecycle hook table
#[derive(Clone, Copy)]
pub struct LifecycleHooks {
    /// Runs right after insertion, before inheritance resolution
    pub create_begin: HookFn,
    /// Completes creation: inheritance resolution and registration
    pub create_finalize: HookFn,
    /// Runs before an alteration is written
    pub alter_begin: HookFn,
    /// Completes an alteration: re-resolution and descendant refresh
    pub alter_finalize: HookFn,
    /// Runs before the entity is removed from the schema
    pub delete_finalize: HookFn,
}

fn noop(schema: &Schema, _id: EntityId, _config: &EngineConfig) -> Result<Schema> {
    Ok(schema.clone())
}

fn refresh_ancestors(schema: &Schema, id: EntityId, _config: &EngineConfig) -> Result<Schema> {
    let entity = schema.get(id)?;
    if entity.bases.is_empty() {
        return Ok(schema.clone());
    }
    let ancestors = linearize::ancestors(schema, id)?;
    if ancestors == entity.ancestors {
        return Ok(schema.clone());
    }
    let mut data = entity.clone();
    data.ancestors = ancestors;
    schema.update(data)
}

fn finalize(schema: &Schema, id: EntityId, config: &EngineConfig) -> Result<Schema> {
    merge::finalize_entity(schema, id, None, config)
}

fn finalize_and_cascade(schema: &Schema, id: EntityId, config: &EngineConfig) -> Result<Schema> {
    let schema = merge::finalize_entity(schema, id, None, config)?;
    merge::update_descendants(&schema, id, config)
}

fn referenced_create_finalize(
    schema: &Schema,
    id: EntityId,
    config: &EngineConfig,
) -> Result<Schema> {
    let schema = merge::finalize_entity(schema, id, None, config)?;
    let member = schema.get(id)?;
    let Some(owner) = member.owner else {
        return Ok(schema);
    };
    let owner_kind = schema.get(owner)?.kind;
    match refdict_for_member(owner_kind, member.kind) {
        Some(rd) => propagate::add_classref(&schema, owner, rd, id),
        None => Ok(schema),
    }
}

fn referenced_delete_finalize(
    schema: &Schema,
    id: EntityId,
    _config: &EngineConfig,
) -> Result<Schema> {
    let member = schema.get(id)?;
    let Some(owner) = member.owner else {
        return Ok(schema.clone());
    };
    let owner_kind = schema.get(owner)?.kind;
    match refdict_for_member(owner_kind, member.kind) {
        Some(rd) => {
            let key = member.refname().to_string();
            propagate::del_classref(schema, owner, rd, &key)
        }
        None => Ok(schema.clone()),
    }
}

/// Hooks for plain inheriting entities
pub static INHERITING_HOOKS: LifecycleHooks = LifecycleHooks {
    create_begin: refresh_ancestors,
    create_finalize: finalize,
    alter_begin: noop,
    alter_finalize: finalize_and_cascade,
    delete_finalize: noop,
};

/// Hooks for entities living in a reference collection of an owner
pub static REFERENCED_HOOKS: LifecycleHooks = LifecycleHooks {
    create_begin: refresh_ancestors,
    create_finalize: referenced_create_finalize,
    alter_begin: noop,
    alter_finalize: finalize_and_cascade,
    delete_finalize: referenced_delete_finalize,
};

/// The lifecycle hook table for an entity kind
#[must_use]
pub fn hooks(kind: EntityKind) -> &'static LifecycleHooks {
    match kind {
        EntityKind::ObjectType => &INHERITING_HOOKS,
        EntityKind::Link
        | EntityKind::Property
        | EntityKind::Constraint
        | EntityKind::Annotation => &REFERENCED_HOOKS,
    }
}

pub(crate) fn resolve_bases(schema: &Schema, names: &[String]) -> Result<Vec<EntityId>> {
    let mut seen = HashSet::with_capacity(names.len());
    let mut bases = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(LatticeError::definition(format!(
                "duplicate base {name} in base list"
            )));
        }
        let base = schema.get_by_name(name)?;
        if base.is_final {
            return Err(LatticeError::definition(format!(
                "cannot inherit from final {} {}",
                base.kind, base.name
            )));
        }
        bases.push(base.id);
    }
    Ok(bases)
}

/// Create a top-level entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEntity {
    /// Fully qualified name
    pub name: String,
    /// Entity kind
    pub kind: EntityKind,
    /// Names of the direct bases, in declaration order
    pub bases: Vec<String>,
    /// Whether the entity is abstract
    pub is_abstract: bool,
    /// Whether the entity is final
    pub is_final: bool,
    /// Source location of the declaration
    pub source: Option<String>,
}

impl CreateEntity {
    /// Create the command with no bases and default flags
    #[must_use]
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
            bases: Vec::new(),
            is_abstract: false,
            is_final: false,
            source: None,
        }
    }

    /// Apply the command.
    ///
    /// An entity declared without bases receives its kind's default base,
    /// unless it is itself one of the kind's hierarchy roots.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::MissingRoot` when the default base is needed
    /// but absent from the schema, `LatticeError::Definition` for a final
    /// base, and `LatticeError::Duplicate` for a name collision.
    pub fn apply(&self, schema: &Schema, config: &EngineConfig) -> Result<CommandOutcome> {
        let mut base_names = self.bases.clone();
        if base_names.is_empty() && !self.kind.root_class_names().contains(&self.name.as_str()) {
            if let Some(default) = self.kind.default_base_name() {
                if schema.entity_id(default).is_none() {
                    return Err(LatticeError::missing_root(&self.name));
                }
                base_names.push(default.to_string());
            }
        }
        let bases = resolve_bases(schema, &base_names)?;

        let mut data = EntityData::new(&self.name, self.kind);
        data.bases = bases;
        data.is_abstract = self.is_abstract;
        data.is_final = self.is_final;
        data.source = self.source.clone();

        let (schema, id) = schema.insert(data)?;
        debug!(entity = %self.name, kind = %self.kind, "created entity");
        let table = hooks(self.kind);
        let schema = (table.create_begin)(&schema, id, config)?;
        let schema = (table.create_finalize)(&schema, id, config)?;
        Ok(CommandOutcome {
            schema,
            entity: id,
            synthesized: Vec::new(),
        })
    }
}

/// Alter a top-level entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterEntity {
    /// Fully qualified name of the entity
    pub name: String,
    /// New abstractness, if changing
    pub set_abstract: Option<bool>,
    /// New finality, if changing
    pub set_final: Option<bool>,
    /// Replacement ancestor cache, if the caller carries one (used by the
    /// rebase cascade to record descendant updates)
    pub set_ancestors: Option<Vec<String>>,
}

impl AlterEntity {
    /// Create an alteration with no changes
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            set_abstract: None,
            set_final: None,
            set_ancestors: None,
        }
    }

    /// An alteration recording a refreshed ancestor list
    #[must_use]
    pub fn ancestors_update(name: impl Into<String>, ancestors: Vec<String>) -> Self {
        Self {
            name: name.into(),
            set_abstract: None,
            set_final: None,
            set_ancestors: Some(ancestors),
        }
    }

    /// Apply the alteration and re-run inheritance resolution.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` for unresolvable names and
    /// propagates finalization failures.
    pub fn apply(&self, schema: &Schema, config: &EngineConfig) -> Result<Schema> {
        let entity = schema.get_by_name(&self.name)?;
        let id = entity.id;
        let table = hooks(entity.kind);

        let schema = (table.alter_begin)(schema, id, config)?;
        let mut data = schema.get(id)?.clone();
        if let Some(value) = self.set_abstract {
            data.is_abstract = value;
        }
        if let Some(value) = self.set_final {
            data.is_final = value;
        }
        if let Some(names) = &self.set_ancestors {
            data.ancestors = names
                .iter()
                .map(|name| Ok(schema.get_by_name(name)?.id))
                .collect::<Result<Vec<_>>>()?;
        }
        let schema = schema.update(data)?;
        (table.alter_finalize)(&schema, id, config)
    }
}

/// Delete a top-level entity together with the members it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEntity {
    /// Fully qualified name of the entity
    pub name: String,
}

impl DeleteEntity {
    /// Create the command
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Apply the deletion.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::Definition` when the entity still has
    /// subclasses.
    pub fn apply(&self, schema: &Schema, config: &EngineConfig) -> Result<CommandOutcome> {
        let entity = schema.get_by_name(&self.name)?;
        let id = entity.id;
        if !schema.children(id).is_empty() {
            return Err(LatticeError::definition(format!(
                "cannot remove {}: it still has subclasses",
                entity.name
            )));
        }
        let kind = entity.kind;

        // owned members go first, so the entity's collections are empty by
        // the time the entity itself is removed
        let mut schema = schema.clone();
        for rd in lattice_core::refdict::refdicts(kind) {
            let local: Vec<EntityId> = schema
                .get(id)?
                .collection(rd.collection)
                .map(|coll| coll.local.values().copied().collect())
                .unwrap_or_default();
            for member in local {
                if schema.get(member)?.owner == Some(id) {
                    schema = remove_member_tree(&schema, member, config)?;
                }
            }
        }

        let table = hooks(kind);
        schema = (table.delete_finalize)(&schema, id, config)?;
        let schema = schema.remove(id)?;
        debug!(entity = %self.name, "deleted entity");
        Ok(CommandOutcome {
            schema,
            entity: id,
            synthesized: Vec::new(),
        })
    }
}

/// Remove a collection member together with the copies derived from it.
///
/// Explicit overrides in descendants are not removed: they keep their
/// declaration and are re-pointed at the definition the removed member was
/// shadowing, or at nothing when no ancestor defines the key.
fn remove_member_tree(schema: &Schema, member: EntityId, config: &EngineConfig) -> Result<Schema> {
    let mut schema = schema.clone();
    for child in schema.children(member).to_vec() {
        let data = schema.get(child)?;
        if data.is_derived && data.derived_from == Some(member) {
            schema = remove_member_tree(&schema, child, config)?;
        }
    }

    let fallback = shadowed_definition(&schema, member)?;
    for child in schema.children(member).to_vec() {
        let mut data = schema.get(child)?.clone();
        data.bases.retain(|&base| base != member);
        if let Some(kept) = fallback {
            if !data.bases.contains(&kept) {
                data.bases.push(kept);
            }
        }
        data.ancestors.clear();
        schema = schema.update(data)?;
        schema = merge::finalize_entity(&schema, child, None, config)?;
    }

    let table = hooks(schema.get(member)?.kind);
    schema = (table.delete_finalize)(&schema, member, config)?;
    schema.remove(member)
}

/// The definition the member shadows on its owner's bases, if any — the
/// same candidate `del_classref` uncovers for non-overriding descendants.
fn shadowed_definition(schema: &Schema, member: EntityId) -> Result<Option<EntityId>> {
    let data = schema.get(member)?;
    let Some(owner) = data.owner else {
        return Ok(None);
    };
    let owner_data = schema.get(owner)?;
    let Some(rd) = refdict_for_member(owner_data.kind, data.kind) else {
        return Ok(None);
    };
    let key = data.refname();
    for &base in &owner_data.bases {
        if let Some(&found) = schema
            .get(base)?
            .collection(rd.collection)
            .and_then(|coll| coll.full.get(key))
        {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Create a member in a reference collection of an owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMember {
    /// Fully qualified name of the owning entity
    pub owner: String,
    /// Collection name on the owner (e.g. `links`, `constraints`)
    pub collection: String,
    /// Key of the member within the collection
    pub key: String,
    /// Whether the declaration carried the `inherited` keyword
    pub declared_inherited: bool,
    /// Whether the member's state must be materialized per inheritor
    pub delegated: bool,
    /// Source location of the declaration
    pub source: Option<String>,
}

impl CreateMember {
    /// Create the command with default flags
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        collection: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            collection: collection.into(),
            key: key.into(),
            declared_inherited: false,
            delegated: false,
            source: None,
        }
    }

    /// Apply the command: insert the member, register it on the owner and
    /// every non-overriding descendant, then merge it against the owner's
    /// inherited view of the same key.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` for an unknown owner or collection,
    /// `LatticeError::Duplicate` when the owner already declares the key
    /// locally, and `LatticeError::Definition` for override-rule violations.
    pub fn apply(&self, schema: &Schema, config: &EngineConfig) -> Result<CommandOutcome> {
        let owner_data = schema.get_by_name(&self.owner)?;
        let owner = owner_data.id;
        let owner_bases = owner_data.bases.clone();
        let rd = resolve_refdict(owner_data.kind, &self.collection)?;
        if owner_data
            .collection(rd.collection)
            .is_some_and(|coll| coll.has_local(&self.key))
        {
            return Err(LatticeError::duplicate(format!(
                "{}: {} in {}",
                self.owner, self.key, self.collection
            )));
        }

        let mut data = EntityData::new(
            derivation::derived_name(&self.key, &self.owner),
            rd.member_kind,
        );
        data.shortname = Some(self.key.clone());
        data.owner = Some(owner);
        data.declared_inherited = self.declared_inherited;
        data.delegated = self.delegated;
        data.source = self.source.clone();

        let (schema, member) = schema.insert(data)?;
        debug!(owner = %self.owner, key = %self.key, collection = %self.collection, "created member");
        let table = hooks(rd.member_kind);
        let schema = (table.create_begin)(&schema, member, config)?;
        let schema = (table.create_finalize)(&schema, member, config)?;

        // owner-level merge for this key enforces the override rules and
        // wires the new member under any inherited definitions
        let keys = [self.key.clone()];
        let schema = merge::merge_classref_dict(&schema, owner, rd, &owner_bases, Some(&keys), config)?;

        Ok(CommandOutcome {
            schema,
            entity: member,
            synthesized: Vec::new(),
        })
    }
}

/// Alter a collection member, materializing a local copy when the member is
/// only inherited by reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterMember {
    /// Fully qualified name of the owning entity
    pub owner: String,
    /// Collection name on the owner
    pub collection: String,
    /// Key of the member within the collection
    pub key: String,
    /// New delegation flag, if changing
    pub set_delegated: Option<bool>,
    /// New abstractness, if changing
    pub set_abstract: Option<bool>,
}

impl AlterMember {
    /// Create an alteration with no changes
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        collection: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            collection: collection.into(),
            key: key.into(),
            set_delegated: None,
            set_abstract: None,
        }
    }

    /// Apply the alteration.
    ///
    /// Altering a member the owner only sees through inheritance first
    /// materializes an owned copy deriving from the inherited definition;
    /// the synthesized creation is reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` when the key is not visible on the
    /// owner.
    pub fn apply(&self, schema: &Schema, config: &EngineConfig) -> Result<CommandOutcome> {
        let owner_data = schema.get_by_name(&self.owner)?;
        let owner = owner_data.id;
        let rd = resolve_refdict(owner_data.kind, &self.collection)?;
        let coll = owner_data
            .collection(rd.collection)
            .ok_or_else(|| LatticeError::not_found(format!("{}.{}", self.owner, self.key)))?;
        let member = coll
            .full
            .get(&self.key)
            .copied()
            .ok_or_else(|| LatticeError::not_found(format!("{}.{}", self.owner, self.key)))?;

        let mut schema = schema.clone();
        let mut synthesized = Vec::new();
        let member = if coll.has_local(&self.key) {
            member
        } else {
            let (next, copy) = derivation::derive_copy(&schema, member, owner, true, config)?;
            schema = propagate::add_classref(&next, owner, rd, copy)?;
            let mut created = CreateMember::new(&self.owner, self.collection.clone(), &self.key);
            created.declared_inherited = true;
            synthesized.push(Command::CreateMember(created));
            debug!(owner = %self.owner, key = %self.key, "materialized inherited member for alteration");
            copy
        };

        let mut data = schema.get(member)?.clone();
        if let Some(value) = self.set_delegated {
            data.delegated = value;
        }
        if let Some(value) = self.set_abstract {
            data.is_abstract = value;
        }
        schema = schema.update(data)?;
        let table = hooks(rd.member_kind);
        let schema = (table.alter_finalize)(&schema, member, config)?;

        Ok(CommandOutcome {
            schema,
            entity: member,
            synthesized,
        })
    }
}

/// Delete a locally declared collection member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMember {
    /// Fully qualified name of the owning entity
    pub owner: String,
    /// Collection name on the owner
    pub collection: String,
    /// Key of the member within the collection
    pub key: String,
}

impl DeleteMember {
    /// Create the command
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        collection: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Apply the deletion, unregistering the member from the owner and every
    /// descendant view before removing it.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::Definition` when the owner does not declare the
    /// key locally; inherited members are deleted on their defining ancestor.
    pub fn apply(&self, schema: &Schema, config: &EngineConfig) -> Result<CommandOutcome> {
        let owner_data = schema.get_by_name(&self.owner)?;
        let rd = resolve_refdict(owner_data.kind, &self.collection)?;
        let member = owner_data
            .collection(rd.collection)
            .and_then(|coll| coll.local.get(&self.key).copied())
            .ok_or_else(|| {
                LatticeError::definition(format!(
                    "{}: {} is not declared locally and can only be deleted on the \
                     entity defining it",
                    self.owner, self.key
                ))
            })?;

        let schema = remove_member_tree(schema, member, config)?;
        debug!(owner = %self.owner, key = %self.key, "deleted member");
        Ok(CommandOutcome {
            schema,
            entity: member,
            synthesized: Vec::new(),
        })
    }
}

fn resolve_refdict(kind: EntityKind, collection: &str) -> Result<&'static RefDict> {
    refdict(kind, collection).ok_or_else(|| {
        LatticeError::not_found(format!("collection {collection} on {kind}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_dispatch() {
        assert!(std::ptr::eq(
            hooks(EntityKind::ObjectType),
            &INHERITING_HOOKS
        ));
        assert!(std::ptr::eq(hooks(EntityKind::Link), &REFERENCED_HOOKS));
        assert!(std::ptr::eq(
            hooks(EntityKind::Constraint),
            &REFERENCED_HOOKS
        ));
    }

    #[test]
    fn test_create_without_default_root_fails() {
        let err = CreateEntity::new("default::User", EntityKind::ObjectType)
            .apply(&Schema::new(), &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, LatticeError::MissingRoot { .. }));
    }

    #[test]
    fn test_resolve_refdict_rejects_unknown_collection() {
        assert!(resolve_refdict(EntityKind::ObjectType, "constraints").is_err());
        assert!(resolve_refdict(EntityKind::Link, "constraints").is_ok());
    }
}
