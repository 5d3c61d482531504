//! Core data model for the lattice schema inheritance engine
//!
//! This crate holds the immutable, versioned [`schema::Schema`] value, the
//! per-entity state participating in multiple inheritance, the static
//! registration table of reference collections, and the error taxonomy
//! shared by the engine crate.

pub mod config;
pub mod entity;
pub mod error;
pub mod ident;
pub mod refdict;
pub mod schema;

/// Commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::entity::{EntityData, RefCollection};
    pub use crate::error::{LatticeError, Result};
    pub use crate::ident::{EntityId, OriginKey};
    pub use crate::refdict::{EntityKind, RefDict, refdict, refdict_for_member, refdicts};
    pub use crate::schema::Schema;
}
