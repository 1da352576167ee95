//! Error types for schema loading.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while assembling a schema registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Two schemas share a name.
    #[error("duplicate entity schema: {0}")]
    DuplicateEntity(String),

    /// A declared association points at an entity that is not registered.
    #[error("association '{owner}.{key}' targets unknown entity '{entity}'")]
    UnknownAssociationTarget {
        owner: String,
        key: String,
        entity: String,
    },
}
