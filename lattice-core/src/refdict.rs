//! Entity kinds and the reference-collection registration table
//!
//! Every entity kind declares, once and statically, which named reference
//! collections its entities carry (links, properties, constraints,
//! annotations), which member kind each collection holds, and whether a
//! locally declared member colliding with an ancestor definition must carry
//! an explicit `inherited` declaration.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of a schema entity participating in inheritance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Object type (e.g. `default::User`)
    ObjectType,
    /// Link between object types
    Link,
    /// Property of an object type or link
    Property,
    /// Constraint attached to a pointer
    Constraint,
    /// Annotation attached to any entity
    Annotation,
}

impl EntityKind {
    /// Lowercase display label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ObjectType => "object type",
            Self::Link => "link",
            Self::Property => "property",
            Self::Constraint => "constraint",
            Self::Annotation => "annotation",
        }
    }

    /// Names of the hierarchy roots for this kind. Entities with these names
    /// are created without falling back to the default base.
    #[must_use]
    pub const fn root_class_names(self) -> &'static [&'static str] {
        match self {
            Self::ObjectType => &["std::BaseObject", "std::Object"],
            Self::Link => &["std::link"],
            Self::Property => &["std::property"],
            Self::Constraint | Self::Annotation => &[],
        }
    }

    /// Default base spliced in when an entity of this kind ends up with an
    /// empty base list
    #[must_use]
    pub const fn default_base_name(self) -> Option<&'static str> {
        match self {
            Self::ObjectType => Some("std::Object"),
            Self::Link => Some("std::link"),
            Self::Property => Some("std::property"),
            Self::Constraint | Self::Annotation => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one reference collection shared by all entities of a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefDict {
    /// Collection name, also the key under which it is stored on an entity
    pub collection: &'static str,
    /// Attribute holding the full (inherited + local) view
    pub full_attr: &'static str,
    /// Attribute holding the locally declared view
    pub local_attr: &'static str,
    /// Attribute on a member holding the reference back to its owner
    pub backref_attr: &'static str,
    /// Kind of the referenced members
    pub member_kind: EntityKind,
    /// Whether a local member colliding with an ancestor definition must be
    /// explicitly declared `inherited`
    pub requires_explicit_inherit: bool,
}

const OBJECT_TYPE_REFDICTS: &[RefDict] = &[
    RefDict {
        collection: "links",
        full_attr: "links",
        local_attr: "own_links",
        backref_attr: "source",
        member_kind: EntityKind::Link,
        requires_explicit_inherit: true,
    },
    RefDict {
        collection: "properties",
        full_attr: "properties",
        local_attr: "own_properties",
        backref_attr: "source",
        member_kind: EntityKind::Property,
        requires_explicit_inherit: true,
    },
    RefDict {
        collection: "annotations",
        full_attr: "annotations",
        local_attr: "own_annotations",
        backref_attr: "subject",
        member_kind: EntityKind::Annotation,
        requires_explicit_inherit: false,
    },
];

const LINK_REFDICTS: &[RefDict] = &[
    RefDict {
        collection: "properties",
        full_attr: "properties",
        local_attr: "own_properties",
        backref_attr: "source",
        member_kind: EntityKind::Property,
        requires_explicit_inherit: true,
    },
    RefDict {
        collection: "constraints",
        full_attr: "constraints",
        local_attr: "own_constraints",
        backref_attr: "subject",
        member_kind: EntityKind::Constraint,
        requires_explicit_inherit: false,
    },
    RefDict {
        collection: "annotations",
        full_attr: "annotations",
        local_attr: "own_annotations",
        backref_attr: "subject",
        member_kind: EntityKind::Annotation,
        requires_explicit_inherit: false,
    },
];

const PROPERTY_REFDICTS: &[RefDict] = &[
    RefDict {
        collection: "constraints",
        full_attr: "constraints",
        local_attr: "own_constraints",
        backref_attr: "subject",
        member_kind: EntityKind::Constraint,
        requires_explicit_inherit: false,
    },
    RefDict {
        collection: "annotations",
        full_attr: "annotations",
        local_attr: "own_annotations",
        backref_attr: "subject",
        member_kind: EntityKind::Annotation,
        requires_explicit_inherit: false,
    },
];

/// All reference collections declared on entities of `kind`
#[must_use]
pub fn refdicts(kind: EntityKind) -> &'static [RefDict] {
    match kind {
        EntityKind::ObjectType => OBJECT_TYPE_REFDICTS,
        EntityKind::Link => LINK_REFDICTS,
        EntityKind::Property => PROPERTY_REFDICTS,
        EntityKind::Constraint | EntityKind::Annotation => &[],
    }
}

static REFDICT_INDEX: Lazy<HashMap<(EntityKind, &'static str), &'static RefDict>> =
    Lazy::new(|| {
        let kinds = [
            EntityKind::ObjectType,
            EntityKind::Link,
            EntityKind::Property,
            EntityKind::Constraint,
            EntityKind::Annotation,
        ];
        let mut index = HashMap::new();
        for kind in kinds {
            for refdict in refdicts(kind) {
                index.insert((kind, refdict.collection), refdict);
            }
        }
        index
    });

/// Look up a collection descriptor by owner kind and collection name
#[must_use]
pub fn refdict(kind: EntityKind, collection: &str) -> Option<&'static RefDict> {
    REFDICT_INDEX.get(&(kind, collection)).copied()
}

/// The collection on `owner_kind` holding members of `member_kind`, if any
#[must_use]
pub fn refdict_for_member(
    owner_kind: EntityKind,
    member_kind: EntityKind,
) -> Option<&'static RefDict> {
    refdicts(owner_kind)
        .iter()
        .find(|rd| rd.member_kind == member_kind)
}
