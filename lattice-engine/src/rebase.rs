//! Base-list rebasing and the descendant cascade
//!
//! A rebase replaces an entity's direct bases by applying an anchored edit
//! script, refreshes its linearization, prunes references whose origin left
//! the ancestry, and then walks every transitive subclass to bring their
//! cached ancestor lists and inherited collections up to date.

use crate::command::AlterEntity;
use crate::delta::{self, BaseDelta};
use crate::linearize;
use crate::merge;
use lattice_core::config::EngineConfig;
use lattice_core::error::{LatticeError, Result};
use lattice_core::ident::EntityId;
use lattice_core::schema::Schema;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Rebase operation for a single entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseEntity {
    /// Display name of the entity being rebased
    pub name: String,
    /// Anchored edit script over the entity's base names
    pub delta: BaseDelta,
    /// Expected resulting base list, kept for diff display
    pub new_bases: Vec<String>,
    /// Optional abstractness change applied with the rebase
    pub set_abstract: Option<bool>,
    /// Optional finality change applied with the rebase
    pub set_final: Option<bool>,
    /// Caller-supplied follow-up operations, applied after the cascade
    pub sub_ops: Vec<AlterEntity>,
}

/// Result of applying a rebase
#[derive(Debug)]
pub struct RebaseOutcome {
    /// Schema version with the rebase applied
    pub schema: Schema,
    /// The rebased entity
    pub entity: EntityId,
    /// Descendant updates synthesized by the cascade, for diff recording
    pub synthesized: Vec<AlterEntity>,
}

impl RebaseEntity {
    /// Create a rebase operation with no field changes or follow-ups
    #[must_use]
    pub fn new(name: impl Into<String>, delta: BaseDelta, new_bases: Vec<String>) -> Self {
        Self {
            name: name.into(),
            delta,
            new_bases,
            set_abstract: None,
            set_final: None,
            sub_ops: Vec::new(),
        }
    }

    /// Apply the rebase and cascade the ancestry refresh through every
    /// transitive subclass.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` for unresolvable names or anchors,
    /// `LatticeError::Definition` when a resulting base is final,
    /// `LatticeError::MissingRoot` when the entity ends up with no bases and
    /// its kind has no default base in the schema, and
    /// `LatticeError::Ordering` when the new hierarchy is inconsistent.
    #[instrument(skip(self, schema, config), fields(entity = %self.name))]
    pub fn apply(&self, schema: &Schema, config: &EngineConfig) -> Result<RebaseOutcome> {
        let mut schema = schema.clone();
        let id = schema.get_by_name(&self.name)?.id;

        let mut data = schema.get(id)?.clone();
        if let Some(value) = self.set_abstract {
            data.is_abstract = value;
        }
        if let Some(value) = self.set_final {
            data.is_final = value;
        }

        // A lone implicit default base collapses before splicing so that
        // explicit bases do not end up sorted after it.
        let kind = data.kind;
        let default_base = kind.default_base_name();
        let mut working = schema.base_names(id)?;
        if let Some(default) = default_base {
            if !self.delta.is_empty() && working.len() == 1 && working[0] == default {
                working.clear();
            }
        }

        let mut new_names = delta::apply_to_names(&working, &self.delta)?;
        if new_names.is_empty() && !kind.root_class_names().contains(&data.name.as_str()) {
            let default =
                default_base.ok_or_else(|| LatticeError::missing_root(&data.name))?;
            if schema.entity_id(default).is_none() {
                return Err(LatticeError::missing_root(&data.name));
            }
            new_names.push(default.to_string());
        }

        let bases = crate::command::resolve_bases(&schema, &new_names)?;
        debug!(bases = ?new_names, "rebasing");
        data.bases = bases;
        data.ancestors.clear();
        schema = schema.update(data)?;

        let ancestors = linearize::ancestors(&schema, id)?;
        let mut data = schema.get(id)?.clone();
        data.ancestors = ancestors;
        schema = schema.update(data)?;
        schema = merge::acquire_ancestor_inheritance(&schema, id, None)?;
        schema = merge::prune_stale_refs(&schema, id)?;

        let mut synthesized = Vec::new();
        for descendant in schema.descendants(id) {
            let ancestors = linearize::ancestors(&schema, descendant)?;
            if schema.get(descendant)?.ancestors != ancestors {
                let mut data = schema.get(descendant)?.clone();
                data.ancestors = ancestors.clone();
                schema = schema.update(data)?;
                if config.record_descendant_ops {
                    let names = ancestors
                        .iter()
                        .map(|&ancestor| Ok(schema.get(ancestor)?.name.clone()))
                        .collect::<Result<Vec<_>>>()?;
                    synthesized
                        .push(AlterEntity::ancestors_update(&schema.get(descendant)?.name, names));
                }
            }
            schema = merge::acquire_ancestor_inheritance(&schema, descendant, None)?;
            schema = merge::prune_stale_refs(&schema, descendant)?;
        }

        for op in &self.sub_ops {
            schema = op.apply(&schema, config)?;
        }

        Ok(RebaseOutcome {
            schema,
            entity: id,
            synthesized,
        })
    }
}
