use crate::document::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One association to create alongside its owner.
///
/// `include` is `None` for a bare association: the child level is linked
/// but carries no further nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeDescriptor {
    pub association_key: String,
    pub child_entity: String,
    /// Child field set to the owner's identifier during the cascading insert.
    pub foreign_key: String,
    pub include: Option<Vec<IncludeDescriptor>>,
}

impl IncludeDescriptor {
    pub fn bare(
        association_key: impl Into<String>,
        child_entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            association_key: association_key.into(),
            child_entity: child_entity.into(),
            foreign_key: foreign_key.into(),
            include: None,
        }
    }

    pub fn nested(mut self, include: Vec<IncludeDescriptor>) -> Self {
        self.include = Some(include);
        self
    }

    /// Number of descriptors in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self
            .include
            .as_ref()
            .map_or(0, |nested| nested.iter().map(Self::count).sum())
    }
}

/// The write a decomposed node turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// One non-root node found while decomposing an update payload.
///
/// `kind` is the classification from the node alone: `Delete` when it
/// carries the deletion marker, `Update` when it carries an identifier,
/// `Create` otherwise. An `Update` is downgraded to `Create` at dispatch
/// time if no row matches the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    pub entity: String,
    pub element: Document,
    pub identifier: Option<Value>,
    /// Nesting depth below the root; direct children are at depth 1.
    pub depth: usize,
}

impl OperationDescriptor {
    pub fn is_delete(&self) -> bool {
        self.kind == OperationKind::Delete
    }
}
