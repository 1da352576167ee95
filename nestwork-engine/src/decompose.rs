//! Payload decomposer: flattens a nested update payload into one
//! descriptor per non-root node.

use crate::error::{EngineError, EngineResult};
use nestwork_model::{
    identifier_of, Document, EntitySchema, NodeKind, OperationDescriptor, OperationKind,
    SchemaRegistry,
};
use serde_json::Value;
use tracing::debug;

pub struct PayloadDecomposer<'a> {
    registry: &'a SchemaRegistry,
    deletion_marker: &'a str,
}

impl<'a> PayloadDecomposer<'a> {
    pub fn new(registry: &'a SchemaRegistry, deletion_marker: &'a str) -> Self {
        Self {
            registry,
            deletion_marker,
        }
    }

    /// Walks `document` (owned by `schema`) and returns every nested node
    /// as a descriptor, children and grandchildren alike in one flat list.
    ///
    /// A delete-marked node without an identifier fails here, before any
    /// storage is touched. Returns `Ok(None)` when nothing resolves.
    pub fn decompose(
        &self,
        document: &Document,
        schema: &EntitySchema,
    ) -> EngineResult<Option<Vec<OperationDescriptor>>> {
        let mut out = Vec::new();
        self.walk(document, schema, 1, &mut out)?;
        Ok((!out.is_empty()).then_some(out))
    }

    fn walk(
        &self,
        document: &Document,
        owner: &EntitySchema,
        depth: usize,
        out: &mut Vec<OperationDescriptor>,
    ) -> EngineResult<()> {
        let Some(fields) = document.as_object() else {
            return Ok(());
        };

        for (key, value) in fields {
            let kind = NodeKind::of(value);
            if !kind.is_nested() {
                continue;
            }
            let Some(child) = self.registry.resolve_child(Some(owner), key, kind) else {
                debug!("{}.{key} does not resolve to an entity, skipped", owner.name);
                continue;
            };

            let elements: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for element in elements {
                if !element.is_object() {
                    debug!("{}.{key} holds a non-object element, skipped", owner.name);
                    continue;
                }
                out.push(self.describe(element, &child.schema, depth)?);
                self.walk(element, &child.schema, depth + 1, out)?;
            }
        }
        Ok(())
    }

    /// Classifies one node from its own fields: deletion marker first, then
    /// identifier, else create.
    pub fn describe(
        &self,
        element: &Document,
        schema: &EntitySchema,
        depth: usize,
    ) -> EngineResult<OperationDescriptor> {
        let identifier = identifier_of(element, &schema.primary_key).cloned();
        let kind = if element.get(self.deletion_marker).is_some() {
            if identifier.is_none() {
                return Err(EngineError::validation(
                    &schema.name,
                    format!(
                        "field '{}' is required to delete a node marked with '{}'",
                        schema.primary_key, self.deletion_marker
                    ),
                ));
            }
            OperationKind::Delete
        } else if identifier.is_some() {
            OperationKind::Update
        } else {
            OperationKind::Create
        };

        Ok(OperationDescriptor {
            kind,
            entity: schema.name.clone(),
            element: element.clone(),
            identifier,
            depth,
        })
    }
}
