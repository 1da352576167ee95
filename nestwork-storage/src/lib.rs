//! Transactional record storage for nestwork.
//!
//! The engine depends on the [`TransactionalStore`] / [`StoreTransaction`]
//! traits only. [`SqliteStore`] is the bundled implementation.
//!
//! # Architecture
//!
//! - Records are JSON attribute maps keyed by `(entity, identifier)`
//! - A transaction owns the connection until it commits or rolls back
//! - Writes issued concurrently against one transaction are serialized
//! - Deletes are physical; there is no soft-delete column

mod error;
mod sqlite;
mod store;

pub use error::{StorageError, StorageResult};
pub use sqlite::{SqliteStore, SqliteTransaction};
pub use store::{Filter, StoreTransaction, TransactionalStore};
