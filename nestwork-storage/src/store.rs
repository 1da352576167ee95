//! Transactional store abstraction.
//!
//! The engine only talks to these two traits. A store hands out
//! transactions; every write goes through a transaction and becomes
//! visible only once it commits.

use crate::error::StorageResult;
use async_trait::async_trait;
use nestwork_model::{Document, Fields};
use serde_json::Value;
use std::fmt;

/// Row selector for updates and deletes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches the row whose identifier equals the value.
    Identifier(Value),
    /// Matches rows whose attribute `name` equals `value`.
    Field { name: String, value: Value },
}

impl Filter {
    pub fn identifier(value: impl Into<Value>) -> Self {
        Self::Identifier(value.into())
    }

    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(value) => write!(f, "id = {value}"),
            Self::Field { name, value } => write!(f, "{name} = {value}"),
        }
    }
}

/// A store that can open transactions and serve unscoped reads.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// Opens a transaction. Dropping it without committing rolls it back.
    async fn begin(&self) -> StorageResult<Box<dyn StoreTransaction>>;

    /// Returns every record of `entity`, outside any transaction.
    async fn find_all(&self, entity: &str) -> StorageResult<Vec<Document>>;

    /// Runs a raw command outside any transaction.
    async fn execute(&self, command: &str) -> StorageResult<Value>;
}

/// An open transaction.
///
/// Methods take `&self` so that a batch of concurrently-started operations
/// can share one transaction; implementations serialize the writes.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Inserts a record. When `attributes` has no value for `primary_key`
    /// an identifier is generated. Returns the stored record.
    async fn create(
        &self,
        entity: &str,
        primary_key: &str,
        attributes: Fields,
    ) -> StorageResult<Document>;

    /// Merges `attributes` into every matching record. Returns the number
    /// of records changed.
    async fn update(&self, entity: &str, filter: &Filter, attributes: &Fields)
    -> StorageResult<u64>;

    /// Physically removes every matching record. Returns the number removed.
    async fn destroy(&self, entity: &str, filter: &Filter) -> StorageResult<u64>;

    /// Looks a record up by identifier.
    async fn find_by_id(&self, entity: &str, identifier: &Value)
    -> StorageResult<Option<Document>>;

    /// Returns every record of `entity` as seen by this transaction.
    async fn find_all(&self, entity: &str) -> StorageResult<Vec<Document>>;

    /// Runs a raw command inside the transaction.
    async fn execute(&self, command: &str) -> StorageResult<Value>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;

    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
