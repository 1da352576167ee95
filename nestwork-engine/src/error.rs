//! Error types for the engine.

use nestwork_model::ModelError;
use nestwork_storage::StorageError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Machine-readable category of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Resolution,
    Storage,
    Saga,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Resolution => "resolution",
            Self::Storage => "storage",
            Self::Saga => "saga",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A node is malformed for the operation it asks for.
    #[error("validation failed on {entity}: {message}")]
    Validation { entity: String, message: String },

    /// The caller named an entity the registry does not know.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Storage failure, passed through unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A post-commit saga step failed. The local writes were compensated.
    #[error("saga step '{step}' failed: {message}")]
    Saga { step: String, message: String },

    #[error("invalid schema: {0}")]
    Schema(#[from] ModelError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn validation(entity: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// The category callers can branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::UnknownEntity(_) => ErrorKind::Resolution,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Saga { .. } => ErrorKind::Saga,
            Self::Schema(_) | Self::Config(_) | Self::Io(_) => ErrorKind::Config,
        }
    }
}
