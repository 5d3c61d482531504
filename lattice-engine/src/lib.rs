//! Inheritance-resolution engine
//!
//! Resolves multiple inheritance over the entity model of `lattice-core`:
//! C3-style linearization, anchored base-list edit scripts, rebase cascades
//! through subclass trees, reference-collection merging with diamond
//! deduplication, and the derivation factory backing materialized and
//! merged members. All mutation entry points live in [`command`].

pub mod command;
pub mod delta;
pub mod derivation;
pub mod linearize;
pub mod merge;
pub mod propagate;
pub mod rebase;

/// Commonly used types and functions
pub mod prelude {
    pub use crate::command::{
        AlterEntity, AlterMember, Command, CommandOutcome, CreateEntity, CreateMember,
        DeleteEntity, DeleteMember, LifecycleHooks, hooks,
    };
    pub use crate::delta::{Anchor, AddedGroup, BaseDelta, apply_to_names, delta_bases, delta_entity};
    pub use crate::derivation::{derive_copy, derive_from_root, derived_name};
    pub use crate::linearize::{
        ancestors, is_subclass, is_subclass_of_any, linearize, nearest_non_derived_parent,
        topmost_concrete_base,
    };
    pub use crate::merge::{
        acquire_ancestor_inheritance, classref_origin, collection_is_consistent, finalize_entity,
        merge_classref_dict, prune_stale_refs, update_descendants,
    };
    pub use crate::propagate::{add_classref, del_classref};
    pub use crate::rebase::{RebaseEntity, RebaseOutcome};
    pub use lattice_core::prelude::*;
}
