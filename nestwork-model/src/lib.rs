//! Core model for the nestwork nested-entity engine.
//!
//! Defines the types every other crate speaks:
//! - [`Document`]: the JSON payload a caller submits, with helpers for
//!   identifiers and redaction
//! - [`EntitySchema`] / [`Association`]: an entity's identifier field and
//!   its declared relation keys
//! - [`SchemaRegistry`]: name → schema lookup plus the [`NamingConvention`]
//!   that maps plural relation keys to entity names
//! - [`IncludeDescriptor`] / [`OperationDescriptor`]: the plans produced for
//!   nested creates and for units of work
//!
//! Nothing here touches storage.

mod document;
mod error;
mod naming;
mod plan;
mod registry;
mod schema;

pub use document::{
    has_nested_fields, identifier_key, identifier_of, redact_fields, redacted, Document, Fields,
    NodeKind, REDACTED,
};
pub use error::{ModelError, ModelResult};
pub use naming::{NamingConvention, NamingOverrides, TrailingCharacter};
pub use plan::{IncludeDescriptor, OperationDescriptor, OperationKind};
pub use registry::{ChildRelation, SchemaDocument, SchemaRegistry};
pub use schema::{Association, EntitySchema, DEFAULT_PRIMARY_KEY};
