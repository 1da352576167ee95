//! Per-entity persistence handle.

use crate::error::{EngineError, EngineResult};
use futures::future::BoxFuture;
use nestwork_model::{
    identifier_of, Document, EntitySchema, Fields, IncludeDescriptor, NodeKind, SchemaRegistry,
};
use nestwork_storage::{Filter, StoreTransaction};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Create / update / delete / find for one entity, always inside a
/// caller-supplied transaction.
///
/// Documents handed to a handle may still carry nested relation fields and
/// the deletion marker; only plain attributes reach storage.
#[derive(Clone)]
pub struct EntityHandle<'a> {
    schema: Arc<EntitySchema>,
    registry: &'a SchemaRegistry,
    deletion_marker: &'a str,
}

impl<'a> EntityHandle<'a> {
    pub fn new(
        schema: Arc<EntitySchema>,
        registry: &'a SchemaRegistry,
        deletion_marker: &'a str,
    ) -> Self {
        Self {
            schema,
            registry,
            deletion_marker,
        }
    }

    /// Handle for `entity`, or [`EngineError::UnknownEntity`].
    pub fn lookup(
        registry: &'a SchemaRegistry,
        entity: &str,
        deletion_marker: &'a str,
    ) -> EngineResult<Self> {
        let schema = registry
            .lookup(entity)
            .ok_or_else(|| EngineError::UnknownEntity(entity.to_string()))?;
        Ok(Self::new(schema, registry, deletion_marker))
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// The plain attributes of `element`: everything except relation fields
    /// and the deletion marker.
    pub fn attributes(&self, element: &Document) -> Fields {
        let Some(fields) = element.as_object() else {
            return Fields::new();
        };
        fields
            .iter()
            .filter(|(key, _)| key.as_str() != self.deletion_marker)
            .filter(|(key, value)| {
                self.registry
                    .resolve_child(Some(&self.schema), key, NodeKind::of(value))
                    .is_none()
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub async fn find_by_identifier(
        &self,
        tx: &dyn StoreTransaction,
        identifier: &Value,
    ) -> EngineResult<Option<Document>> {
        Ok(tx.find_by_id(self.name(), identifier).await?)
    }

    /// Updates the record matching `identifier` with the element's
    /// attributes. The identifier itself is never rewritten.
    pub async fn update(
        &self,
        tx: &dyn StoreTransaction,
        identifier: &Value,
        element: &Document,
    ) -> EngineResult<u64> {
        let mut attributes = self.attributes(element);
        attributes.remove(&self.schema.primary_key);
        let affected = tx
            .update(self.name(), &Filter::Identifier(identifier.clone()), &attributes)
            .await?;
        Ok(affected)
    }

    /// Physically removes the record matching `identifier`.
    pub async fn destroy(&self, tx: &dyn StoreTransaction, identifier: &Value) -> EngineResult<u64> {
        Ok(tx
            .destroy(self.name(), &Filter::Identifier(identifier.clone()))
            .await?)
    }

    /// Inserts `element` alone, ignoring any nested relation fields.
    pub async fn create(&self, tx: &dyn StoreTransaction, element: &Document) -> EngineResult<Document> {
        let attributes = self.attributes(element);
        Ok(tx
            .create(self.name(), &self.schema.primary_key, attributes)
            .await?)
    }

    /// Cascading insert: the owner row, then every included child with its
    /// foreign key set to the owner's identifier, recursively.
    ///
    /// Returns the created graph, children nested under their association
    /// keys the same way they were submitted.
    pub fn create_graph<'s>(
        &'s self,
        tx: &'s dyn StoreTransaction,
        document: &'s Document,
        include: Option<&'s [IncludeDescriptor]>,
    ) -> BoxFuture<'s, EngineResult<Document>> {
        Box::pin(async move {
            let mut created = self.create(tx, document).await?;
            let Some(include) = include else {
                return Ok(created);
            };
            let owner_id = identifier_of(&created, &self.schema.primary_key)
                .cloned()
                .unwrap_or(Value::Null);

            for descriptor in include {
                let Some(value) = document.get(&descriptor.association_key) else {
                    continue;
                };
                let child = EntityHandle::lookup(
                    self.registry,
                    &descriptor.child_entity,
                    self.deletion_marker,
                )?;
                let elements: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    Value::Object(_) => vec![value],
                    _ => Vec::new(),
                };

                let mut children = Vec::with_capacity(elements.len());
                for element in elements {
                    if !element.is_object() {
                        warn!(
                            "skipping non-object element under {}.{}",
                            self.name(),
                            descriptor.association_key
                        );
                        continue;
                    }
                    let mut linked = element.clone();
                    linked[descriptor.foreign_key.as_str()] = owner_id.clone();
                    let nested = child
                        .create_graph(tx, &linked, descriptor.include.as_deref())
                        .await?;
                    children.push(nested);
                }
                debug!(
                    "created {} {} under {}.{}",
                    children.len(),
                    child.name(),
                    self.name(),
                    descriptor.association_key
                );

                created[descriptor.association_key.as_str()] = if value.is_array() {
                    Value::Array(children)
                } else {
                    children.into_iter().next().unwrap_or(Value::Null)
                };
            }
            Ok(created)
        })
    }

    /// Removes a graph returned by [`create_graph`](Self::create_graph),
    /// children first. Returns the number of records removed.
    pub fn destroy_graph<'s>(
        &'s self,
        tx: &'s dyn StoreTransaction,
        created: &'s Document,
        include: Option<&'s [IncludeDescriptor]>,
    ) -> BoxFuture<'s, EngineResult<u64>> {
        Box::pin(async move {
            let mut removed = 0;
            for descriptor in include.unwrap_or_default() {
                let child = EntityHandle::lookup(
                    self.registry,
                    &descriptor.child_entity,
                    self.deletion_marker,
                )?;
                let nodes: Vec<&Value> = match created.get(&descriptor.association_key) {
                    Some(Value::Array(items)) => items.iter().collect(),
                    Some(node @ Value::Object(_)) => vec![node],
                    _ => Vec::new(),
                };
                for node in nodes {
                    removed += child
                        .destroy_graph(tx, node, descriptor.include.as_deref())
                        .await?;
                }
            }
            if let Some(identifier) = identifier_of(created, &self.schema.primary_key) {
                removed += self.destroy(tx, identifier).await?;
            }
            Ok(removed)
        })
    }
}
