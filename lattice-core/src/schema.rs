//! Immutable, versioned schema values
//!
//! A [`Schema`] is a cheap-to-clone value: entity states, the name index and
//! the subclass index are held behind `Arc`s and shared structurally between
//! versions. Every write clones the touched containers and returns a new
//! version; a reader holding an older version never observes the write.

use crate::entity::EntityData;
use crate::error::{LatticeError, Result};
use crate::ident::EntityId;
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

/// One immutable version of the schema
#[derive(Debug, Clone, Default)]
pub struct Schema {
    version: u64,
    next_id: u64,
    entities: Arc<IndexMap<EntityId, Arc<EntityData>>>,
    names: Arc<HashMap<String, EntityId>>,
    children: Arc<HashMap<EntityId, Vec<EntityId>>>,
}

impl Schema {
    /// Create an empty schema
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Version counter, bumped on every write
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Number of entities in this version
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether this version holds no entities
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity state by id, if present
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Arc<EntityData>> {
        self.entities.get(&id)
    }

    /// Entity state by id
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` if the id is not in this version.
    pub fn get(&self, id: EntityId) -> Result<&EntityData> {
        self.entities
            .get(&id)
            .map(AsRef::as_ref)
            .ok_or_else(|| LatticeError::not_found(id.to_string()))
    }

    /// Id of the entity with the given name, if present
    #[must_use]
    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    /// Entity state by name
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` if no entity carries the name.
    pub fn get_by_name(&self, name: &str) -> Result<&EntityData> {
        let id = self
            .entity_id(name)
            .ok_or_else(|| LatticeError::not_found(name))?;
        self.get(id)
    }

    /// Iterator over all entity ids, in insertion order
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Display names of an entity's direct bases, in declaration order
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` for an unknown entity or base.
    pub fn base_names(&self, id: EntityId) -> Result<Vec<String>> {
        self.get(id)?
            .bases
            .iter()
            .map(|&base| Ok(self.get(base)?.name.clone()))
            .collect()
    }

    /// Direct subclasses of an entity, in creation order
    #[must_use]
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// All transitive subclasses of an entity, breadth-first
    #[must_use]
    pub fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut queue: VecDeque<EntityId> = self.children(id).iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if out.contains(&next) {
                continue;
            }
            out.push(next);
            queue.extend(self.children(next).iter().copied());
        }
        out
    }

    /// Insert a new entity, assigning its id, and return the new version
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::Duplicate` on a name collision and
    /// `LatticeError::NotFound` if a declared base does not exist.
    pub fn insert(&self, mut data: EntityData) -> Result<(Self, EntityId)> {
        if self.names.contains_key(&data.name) {
            return Err(LatticeError::duplicate(&data.name));
        }
        for &base in &data.bases {
            if !self.entities.contains_key(&base) {
                return Err(LatticeError::not_found(base.to_string()));
            }
        }

        let id = EntityId::new(self.next_id);
        data.id = id;
        trace!(entity = %data.name, %id, "schema insert");

        let mut entities = (*self.entities).clone();
        let mut names = (*self.names).clone();
        let mut children = (*self.children).clone();

        names.insert(data.name.clone(), id);
        for &base in &data.bases {
            let entry = children.entry(base).or_default();
            if !entry.contains(&id) {
                entry.push(id);
            }
        }
        entities.insert(id, Arc::new(data));

        Ok((
            Self {
                version: self.version + 1,
                next_id: self.next_id + 1,
                entities: Arc::new(entities),
                names: Arc::new(names),
                children: Arc::new(children),
            },
            id,
        ))
    }

    /// Replace the state of an existing entity and return the new version
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` for an unknown entity or base, and
    /// `LatticeError::Duplicate` when a rename collides.
    pub fn update(&self, data: EntityData) -> Result<Self> {
        let old = self
            .entities
            .get(&data.id)
            .ok_or_else(|| LatticeError::not_found(data.id.to_string()))?
            .clone();
        for &base in &data.bases {
            if !self.entities.contains_key(&base) {
                return Err(LatticeError::not_found(base.to_string()));
            }
        }

        let mut entities = (*self.entities).clone();
        let mut names = (*self.names).clone();
        let mut children = (*self.children).clone();

        if old.name != data.name {
            if names.contains_key(&data.name) {
                return Err(LatticeError::duplicate(&data.name));
            }
            names.remove(&old.name);
            names.insert(data.name.clone(), data.id);
        }

        if old.bases != data.bases {
            for base in &old.bases {
                if let Some(entry) = children.get_mut(base) {
                    entry.retain(|&child| child != data.id);
                }
            }
            for &base in &data.bases {
                let entry = children.entry(base).or_default();
                if !entry.contains(&data.id) {
                    entry.push(data.id);
                }
            }
        }

        entities.insert(data.id, Arc::new(data));

        Ok(Self {
            version: self.version + 1,
            next_id: self.next_id,
            entities: Arc::new(entities),
            names: Arc::new(names),
            children: Arc::new(children),
        })
    }

    /// Remove an entity and return the new version
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::NotFound` for an unknown entity and
    /// `LatticeError::Definition` if the entity still has subclasses.
    pub fn remove(&self, id: EntityId) -> Result<Self> {
        let data = self.get(id)?;
        if !self.children(id).is_empty() {
            return Err(LatticeError::definition(format!(
                "cannot remove {}: it still has subclasses",
                data.name
            )));
        }
        trace!(entity = %data.name, %id, "schema remove");

        let mut entities = (*self.entities).clone();
        let mut names = (*self.names).clone();
        let mut children = (*self.children).clone();

        names.remove(&data.name);
        for base in &data.bases {
            if let Some(entry) = children.get_mut(base) {
                entry.retain(|&child| child != id);
            }
        }
        children.remove(&id);
        entities.shift_remove(&id);

        Ok(Self {
            version: self.version + 1,
            next_id: self.next_id,
            entities: Arc::new(entities),
            names: Arc::new(names),
            children: Arc::new(children),
        })
    }
}
