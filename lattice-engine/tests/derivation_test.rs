//! Derivation factory and materialize-on-alter behavior

mod common;

use common::{create_type, has_local, member, std_schema};
use lattice_core::prelude::*;
use lattice_engine::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn test_derive_copy_shape() {
    let schema = std_schema();
    let config = EngineConfig::default();
    let (schema, a) = create_type(&schema, "default::A", &[]);
    let source = CreateMember::new("default::A", "links", "friends")
        .apply(&schema, &config)
        .expect("create member");
    let schema = source.schema;
    let (schema, b) = create_type(&schema, "default::B", &[]);

    let (schema, copy) = derive_copy(&schema, source.entity, b, true, &config).expect("derive");
    let data = schema.get(copy).expect("get");
    assert_eq!(data.name, derived_name("friends", "default::B"));
    assert_eq!(data.shortname.as_deref(), Some("friends"));
    assert_eq!(data.owner, Some(b));
    assert_eq!(data.derived_from, Some(source.entity));
    assert_eq!(data.bases, vec![source.entity]);
    assert!(data.is_derived);
    assert!(data.declared_inherited);
    assert!(!data.delegated);

    // a is untouched by deriving for b
    assert_eq!(member(&schema, a, "links", "friends"), Some(source.entity));
}

#[test]
fn test_nearest_non_derived_parent_walks_derivation_chain() {
    let schema = std_schema();
    let config = EngineConfig::default();
    let (schema, _) = create_type(&schema, "default::A", &[]);
    let source = CreateMember::new("default::A", "links", "friends")
        .apply(&schema, &config)
        .expect("create member");
    let schema = source.schema;
    let (schema, b) = create_type(&schema, "default::B", &[]);
    let (schema, c) = create_type(&schema, "default::C", &[]);

    let (schema, first) = derive_copy(&schema, source.entity, b, true, &config).expect("derive");
    let (schema, second) = derive_copy(&schema, first, c, true, &config).expect("derive");

    assert_eq!(
        nearest_non_derived_parent(&schema, second).expect("parent"),
        source.entity
    );
    assert_eq!(
        nearest_non_derived_parent(&schema, source.entity).expect("parent"),
        source.entity
    );
}

#[test]
fn test_alter_materializes_inherited_member() {
    let schema = std_schema();
    let config = EngineConfig::default();
    let (schema, _) = create_type(&schema, "default::A", &[]);
    let source = CreateMember::new("default::A", "links", "friends")
        .apply(&schema, &config)
        .expect("create member");
    let schema = source.schema;
    let (schema, b) = create_type(&schema, "default::B", &["default::A"]);
    assert!(!has_local(&schema, b, "links", "friends"));

    let mut op = AlterMember::new("default::B", "links", "friends");
    op.set_delegated = Some(true);
    let outcome = op.apply(&schema, &config).expect("alter");
    let schema = outcome.schema;

    // the alteration landed on a freshly materialized copy, not the original
    let altered = outcome.entity;
    assert_ne!(altered, source.entity);
    assert!(has_local(&schema, b, "links", "friends"));
    assert_eq!(member(&schema, b, "links", "friends"), Some(altered));

    let data = schema.get(altered).expect("get");
    assert_eq!(data.derived_from, Some(source.entity));
    assert!(data.delegated);
    assert!(!schema.get(source.entity).expect("get").delegated);

    // the synthesized creation is reported for diff recording
    assert_eq!(outcome.synthesized.len(), 1);
    assert!(matches!(
        outcome.synthesized[0],
        Command::CreateMember(ref op) if op.key == "friends" && op.owner == "default::B"
    ));
}

#[test]
fn test_alter_of_local_member_changes_it_in_place() {
    let schema = std_schema();
    let config = EngineConfig::default();
    let (schema, _) = create_type(&schema, "default::A", &[]);
    let source = CreateMember::new("default::A", "links", "friends")
        .apply(&schema, &config)
        .expect("create member");
    let schema = source.schema;

    let mut op = AlterMember::new("default::A", "links", "friends");
    op.set_delegated = Some(true);
    let outcome = op.apply(&schema, &config).expect("alter");

    assert_eq!(outcome.entity, source.entity);
    assert!(outcome.synthesized.is_empty());
    assert!(outcome.schema.get(source.entity).expect("get").delegated);
}

#[test]
fn test_altering_an_unknown_member_fails() {
    let schema = std_schema();
    let (schema, _) = create_type(&schema, "default::A", &[]);
    let err = AlterMember::new("default::A", "links", "missing")
        .apply(&schema, &EngineConfig::default())
        .unwrap_err();
    assert!(matches!(err, LatticeError::NotFound { .. }));
}

#[test]
fn test_self_derivation_is_rejected() {
    let schema = std_schema();
    let config = EngineConfig::default();
    let (schema, a) = create_type(&schema, "default::A", &[]);
    let source = CreateMember::new("default::A", "links", "friends")
        .apply(&schema, &config)
        .expect("create member");
    let schema = source.schema;
    let before = schema.version();

    // deriving the member onto its own owner reproduces its own name
    let err = derive_copy(&schema, source.entity, a, true, &config).unwrap_err();
    assert!(matches!(err, LatticeError::Definition { .. }));
    assert_eq!(schema.version(), before);
}

#[test]
fn test_merged_derivation_from_its_own_exemplar_is_rejected() {
    let schema = std_schema();
    let config = EngineConfig::default();
    let (schema, a) = create_type(&schema, "default::A", &[]);
    let source = CreateMember::new("default::A", "links", "friends")
        .apply(&schema, &config)
        .expect("create member");
    let schema = source.schema;

    let bases = [source.entity];
    let err = derive_from_root(&schema, source.entity, a, "friends", &bases, &config).unwrap_err();
    assert!(matches!(err, LatticeError::Definition { .. }));
}

#[test]
fn test_commands_survive_json() {
    let mut create = CreateMember::new("default::A", "links", "friends");
    create.delegated = true;
    let command = Command::CreateMember(create);
    let json = serde_json::to_string(&command).expect("serialize");
    let back: Command = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, command);
}
