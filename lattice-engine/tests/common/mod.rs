//! Shared fixtures for the engine integration tests
#![allow(dead_code)]

use lattice_core::prelude::*;
use lattice_engine::prelude::*;

/// A schema seeded with the standard hierarchy roots
pub fn std_schema() -> Schema {
    let config = EngineConfig::default();

    let mut base = CreateEntity::new("std::BaseObject", EntityKind::ObjectType);
    base.is_abstract = true;
    let schema = base
        .apply(&Schema::new(), &config)
        .expect("create std::BaseObject")
        .schema;

    let mut object = CreateEntity::new("std::Object", EntityKind::ObjectType);
    object.bases = vec!["std::BaseObject".into()];
    let schema = object
        .apply(&schema, &config)
        .expect("create std::Object")
        .schema;

    let mut link = CreateEntity::new("std::link", EntityKind::Link);
    link.is_abstract = true;
    let schema = link.apply(&schema, &config).expect("create std::link").schema;

    let mut property = CreateEntity::new("std::property", EntityKind::Property);
    property.is_abstract = true;
    property
        .apply(&schema, &config)
        .expect("create std::property")
        .schema
}

/// Create an object type with the given base names
pub fn create_type(schema: &Schema, name: &str, bases: &[&str]) -> (Schema, EntityId) {
    let mut op = CreateEntity::new(name, EntityKind::ObjectType);
    op.bases = bases.iter().map(ToString::to_string).collect();
    let outcome = op
        .apply(schema, &EngineConfig::default())
        .unwrap_or_else(|err| panic!("create {name}: {err}"));
    (outcome.schema, outcome.entity)
}

/// Create a link type (top-level, usable as a member-collection owner)
pub fn create_link(schema: &Schema, name: &str, bases: &[&str]) -> (Schema, EntityId) {
    let mut op = CreateEntity::new(name, EntityKind::Link);
    op.bases = bases.iter().map(ToString::to_string).collect();
    let outcome = op
        .apply(schema, &EngineConfig::default())
        .unwrap_or_else(|err| panic!("create {name}: {err}"));
    (outcome.schema, outcome.entity)
}

/// The member an entity exposes under `collection`/`key`, if any
pub fn member(schema: &Schema, entity: EntityId, collection: &str, key: &str) -> Option<EntityId> {
    schema
        .get(entity)
        .expect("entity")
        .collection(collection)
        .and_then(|coll| coll.full.get(key).copied())
}

/// Whether an entity declares `collection`/`key` locally
pub fn has_local(schema: &Schema, entity: EntityId, collection: &str, key: &str) -> bool {
    schema
        .get(entity)
        .expect("entity")
        .collection(collection)
        .is_some_and(|coll| coll.has_local(key))
}
