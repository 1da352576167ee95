//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A write would break a uniqueness or integrity rule.
    #[error("constraint violation on {entity}: {detail}")]
    Constraint { entity: String, detail: String },

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The transaction was already committed or rolled back.
    #[error("transaction {0} is closed")]
    TransactionClosed(String),
}

impl StorageError {
    /// Maps a SQLite error raised while writing `entity`, turning
    /// constraint failures into [`StorageError::Constraint`].
    pub(crate) fn from_write(entity: &str, err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint {
                    entity: entity.to_string(),
                    detail: message.unwrap_or_else(|| code.to_string()),
                }
            }
            other => Self::Database(other),
        }
    }
}
