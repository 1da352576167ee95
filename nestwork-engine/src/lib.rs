//! Nested-entity transaction engine.
//!
//! A caller submits a nested document for a root entity; the engine decides
//! per node whether to create, update or delete, and runs the whole batch
//! as one transaction.
//!
//! ## Components
//!
//! - **AssociationResolver**: nested create payload → include plan
//! - **PayloadDecomposer**: nested update payload → flat operation list
//! - **OperationResolver**: one descriptor → create / update / delete
//! - **UnitOfWorkExecutor**: root update + all operations in one transaction
//! - **NestedEntityEngine**: the caller-facing surface over all of the above
//!
//! # Example
//!
//! ```no_run
//! use nestwork_engine::{EngineConfig, NestedEntityEngine};
//! use nestwork_model::{EntitySchema, SchemaRegistry};
//! use nestwork_storage::SqliteStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> nestwork_engine::EngineResult<()> {
//! let registry = SchemaRegistry::new()
//!     .register(EntitySchema::new("company").associate("contacts", "contact"))
//!     .register(EntitySchema::new("contact"));
//! let store = Arc::new(SqliteStore::open_in_memory()?);
//! let engine = NestedEntityEngine::new(store, Arc::new(registry), EngineConfig::default());
//!
//! let created = engine
//!     .create_entity("company", &json!({"Name": "Acme", "contacts": [{"Name": "Bob"}]}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod decompose;
mod engine;
mod error;
mod handle;
mod include;
mod resolve;
mod saga;
mod unit_of_work;

pub use config::{
    load_registry, registry_from_toml_str, BatchOrder, EngineConfig, DEFAULT_DELETION_MARKER,
};
pub use decompose::PayloadDecomposer;
pub use engine::NestedEntityEngine;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use handle::EntityHandle;
pub use include::AssociationResolver;
pub use resolve::{Effect, OperationResolver};
pub use saga::{Saga, SagaFailure, SagaStep};
pub use unit_of_work::{UnitOfWorkExecutor, UnitOfWorkReport};
