//! Engine configuration and schema loading.

use crate::error::EngineResult;
use nestwork_model::{SchemaDocument, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Field whose presence marks a node for deletion.
pub const DEFAULT_DELETION_MARKER: &str = "marked_as_deleted";

/// How a unit of work schedules its decomposed operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOrder {
    /// Root update and every child operation start together and are
    /// awaited jointly. No parent/child ordering.
    #[default]
    Concurrent,
    /// Root update first, then child operations one at a time,
    /// shallowest first.
    ParentFirst,
}

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Field whose presence turns a node into a delete.
    pub deletion_marker: String,
    /// Field names redacted before payloads are logged.
    pub sensitive_fields: Vec<String>,
    pub batch_order: BatchOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deletion_marker: DEFAULT_DELETION_MARKER.to_string(),
            sensitive_fields: vec!["password".to_string()],
            batch_order: BatchOrder::Concurrent,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> EngineResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

/// Parses a registry from TOML:
///
/// ```toml
/// [[entities]]
/// name = "company"
/// associations = [{ key = "contacts", entity = "contact" }]
///
/// [[entities]]
/// name = "contact"
/// ```
pub fn registry_from_toml_str(contents: &str) -> EngineResult<SchemaRegistry> {
    let document: SchemaDocument = toml::from_str(contents)?;
    Ok(SchemaRegistry::from_document(document)?)
}

pub fn load_registry(path: &Path) -> EngineResult<SchemaRegistry> {
    registry_from_toml_str(&std::fs::read_to_string(path)?)
}
