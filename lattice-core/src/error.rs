//! Error types for schema inheritance operations

use thiserror::Error;

/// Main error type for schema inheritance operations
#[derive(Error, Debug)]
pub enum LatticeError {
    /// Linearization could not produce a consistent ancestor order
    #[error("could not find consistent ancestor order for {entity}")]
    Ordering {
        /// Display name of the entity whose hierarchy is inconsistent
        entity: String,
    },

    /// Invalid inheritance declaration
    #[error("invalid definition: {message}")]
    Definition {
        /// Error message
        message: String,
        /// Source location of the offending declaration, if available
        location: Option<String>,
    },

    /// An entity resolves to no bases and no default root exists, or all
    /// of its ancestors are abstract
    #[error("{entity} has no non-abstract ancestors")]
    MissingRoot {
        /// Display name of the entity
        entity: String,
    },

    /// Schema element lookup failure
    #[error("schema element not found: {element}")]
    NotFound {
        /// Name or identifier of the missing element
        element: String,
    },

    /// Name collision on schema insertion
    #[error("schema element already exists: {name}")]
    Duplicate {
        /// Name of the colliding element
        name: String,
    },
}

/// Result type alias for schema inheritance operations
pub type Result<T> = std::result::Result<T, LatticeError>;

impl LatticeError {
    /// Create a new ordering-inconsistency error
    #[must_use]
    pub fn ordering(entity: impl Into<String>) -> Self {
        Self::Ordering {
            entity: entity.into(),
        }
    }

    /// Create a new definition error
    #[must_use]
    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition {
            message: message.into(),
            location: None,
        }
    }

    /// Create a new definition error with a source location
    #[must_use]
    pub fn definition_at(message: impl Into<String>, location: Option<String>) -> Self {
        Self::Definition {
            message: message.into(),
            location,
        }
    }

    /// Create a new missing-root error
    #[must_use]
    pub fn missing_root(entity: impl Into<String>) -> Self {
        Self::MissingRoot {
            entity: entity.into(),
        }
    }

    /// Create a new not-found error
    #[must_use]
    pub fn not_found(element: impl Into<String>) -> Self {
        Self::NotFound {
            element: element.into(),
        }
    }

    /// Create a new duplicate-name error
    #[must_use]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::Duplicate { name: name.into() }
    }
}
