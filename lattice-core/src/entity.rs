//! Schema entity state and reference collections

use crate::ident::EntityId;
use crate::refdict::EntityKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One named reference collection on an entity, split into the full
/// (inherited + local) view and the locally declared view.
///
/// Invariant: every key in `local` is also in `full`; a key in `full` but not
/// in `local` is traceable to the ancestor that defines it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefCollection {
    /// All members visible on the entity, inherited and local
    pub full: IndexMap<String, EntityId>,
    /// Members declared directly on the entity
    pub local: IndexMap<String, EntityId>,
}

impl RefCollection {
    /// Whether both views are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full.is_empty() && self.local.is_empty()
    }

    /// Whether the entity declares `key` locally
    #[must_use]
    pub fn has_local(&self, key: &str) -> bool {
        self.local.contains_key(key)
    }
}

/// State of a single inheriting schema entity.
///
/// Entities are stored behind `Arc` inside a [`crate::schema::Schema`]; all
/// modification goes through cloning the state and writing it back as part
/// of a new schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    /// Identity, assigned by the schema on insertion
    pub id: EntityId,
    /// Fully qualified display name
    pub name: String,
    /// Collection key for referenced members; `None` for top-level entities
    pub shortname: Option<String>,
    /// Entity kind
    pub kind: EntityKind,
    /// Direct bases, in declaration order
    pub bases: Vec<EntityId>,
    /// Cached transitive ancestors in linearization order, self excluded
    pub ancestors: Vec<EntityId>,
    /// Abstract entities cannot be the topmost concrete base
    pub is_abstract: bool,
    /// Final entities cannot be used as a parent
    pub is_final: bool,
    /// Whether this entity was synthesized by the derivation factory
    pub is_derived: bool,
    /// The entity this one was synthesized from, if any
    pub derived_from: Option<EntityId>,
    /// Explicit override marker: the member was declared `inherited`
    pub declared_inherited: bool,
    /// Carries per-owner state that must be materialized on inheritance
    /// (delegated constraints); forbids pure sharing
    pub delegated: bool,
    /// Back-reference to the owning entity for referenced members
    pub owner: Option<EntityId>,
    /// Reference collections, keyed by collection name
    pub collections: IndexMap<String, RefCollection>,
    /// Source location of the declaration, if known
    pub source: Option<String>,
}

impl EntityData {
    /// Create a fresh entity state. The id is a placeholder until the entity
    /// is inserted into a schema.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: EntityId::default(),
            name: name.into(),
            shortname: None,
            kind,
            bases: Vec::new(),
            ancestors: Vec::new(),
            is_abstract: false,
            is_final: false,
            is_derived: false,
            derived_from: None,
            declared_inherited: false,
            delegated: false,
            owner: None,
            collections: IndexMap::new(),
            source: None,
        }
    }

    /// The key under which this entity appears in its owner's collections
    #[must_use]
    pub fn refname(&self) -> &str {
        self.shortname.as_deref().unwrap_or(&self.name)
    }

    /// Reference collection by name, if present
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&RefCollection> {
        self.collections.get(name)
    }

    /// Mutable reference collection, created empty on first access
    pub fn collection_mut(&mut self, name: &str) -> &mut RefCollection {
        self.collections.entry(name.to_string()).or_default()
    }
}
