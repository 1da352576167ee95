//! Association resolver: turns a nested creation payload into an include
//! plan for one cascading insert.

use nestwork_model::{Document, EntitySchema, IncludeDescriptor, NodeKind, SchemaRegistry};
use serde_json::Value;
use tracing::debug;

pub struct AssociationResolver<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> AssociationResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Computes the include plan for `document` owned by `schema`.
    ///
    /// Every object or array field that resolves to a registered entity
    /// becomes one descriptor. Arrays are sampled through their first
    /// element only; elements are assumed to share a shape. Returns `None`
    /// when no field resolves.
    pub fn resolve_includes(
        &self,
        document: &Document,
        schema: &EntitySchema,
    ) -> Option<Vec<IncludeDescriptor>> {
        let fields = document.as_object()?;
        let mut includes = Vec::new();

        for (key, value) in fields {
            let kind = NodeKind::of(value);
            if !kind.is_nested() {
                continue;
            }
            let Some(child) = self.registry.resolve_child(Some(schema), key, kind) else {
                debug!("{}.{key} does not resolve to an entity, not included", schema.name);
                continue;
            };

            let sample = match value {
                Value::Array(items) => items.first(),
                other => Some(other),
            };
            let nested = sample.and_then(|s| self.resolve_includes(s, &child.schema));
            let foreign_key = child
                .foreign_key
                .unwrap_or_else(|| format!("{}_id", schema.name));

            let descriptor = IncludeDescriptor::bare(key.as_str(), child.schema.name.as_str(), foreign_key);
            includes.push(match nested {
                Some(nested) => descriptor.nested(nested),
                None => descriptor,
            });
        }

        (!includes.is_empty()).then_some(includes)
    }
}
