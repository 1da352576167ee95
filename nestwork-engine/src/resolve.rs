//! Operation resolver: turns one descriptor into a storage effect inside
//! the active transaction.

use crate::error::{EngineError, EngineResult};
use crate::handle::EntityHandle;
use nestwork_model::{OperationDescriptor, OperationKind, SchemaRegistry};
use nestwork_storage::StoreTransaction;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

/// What a resolved descriptor did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Effect {
    pub kind: OperationKind,
    pub entity: String,
    /// Identifier of the affected record. For creates this is the stored
    /// (possibly generated) identifier.
    pub identifier: Option<Value>,
    pub affected: u64,
}

pub struct OperationResolver<'a> {
    registry: &'a SchemaRegistry,
    deletion_marker: &'a str,
}

impl<'a> OperationResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry, deletion_marker: &'a str) -> Self {
        Self {
            registry,
            deletion_marker,
        }
    }

    /// Applies `descriptor`:
    ///
    /// 1. delete-marked → hard delete by identifier (identifier required)
    /// 2. identifier present → update if a row matches, create otherwise
    /// 3. neither → create
    ///
    /// Each descriptor is resolved on its own; siblings never influence
    /// each other.
    pub async fn resolve(
        &self,
        descriptor: &OperationDescriptor,
        tx: &dyn StoreTransaction,
    ) -> EngineResult<Effect> {
        let handle = EntityHandle::lookup(self.registry, &descriptor.entity, self.deletion_marker)?;
        let element = &descriptor.element;

        match (descriptor.kind, descriptor.identifier.as_ref()) {
            (OperationKind::Delete, None) => Err(EngineError::validation(
                handle.name(),
                format!(
                    "field '{}' is required to delete a node marked with '{}'",
                    handle.schema().primary_key,
                    self.deletion_marker
                ),
            )),
            (OperationKind::Delete, Some(identifier)) => {
                debug!("deleting {} {identifier}", handle.name());
                let affected = handle.destroy(tx, identifier).await?;
                Ok(self.effect(OperationKind::Delete, &handle, Some(identifier.clone()), affected))
            }
            (_, Some(identifier)) => match handle.find_by_identifier(tx, identifier).await? {
                Some(_) => {
                    info!("updating {} {identifier}", handle.name());
                    let affected = handle.update(tx, identifier, element).await?;
                    Ok(self.effect(OperationKind::Update, &handle, Some(identifier.clone()), affected))
                }
                None => {
                    info!("creating {} with client identifier {identifier}", handle.name());
                    let created = handle.create(tx, element).await?;
                    Ok(self.created(&handle, &created))
                }
            },
            (_, None) => {
                debug!("creating {}", handle.name());
                let created = handle.create(tx, element).await?;
                Ok(self.created(&handle, &created))
            }
        }
    }

    fn created(&self, handle: &EntityHandle<'_>, record: &Value) -> Effect {
        let identifier = record.get(&handle.schema().primary_key).cloned();
        self.effect(OperationKind::Create, handle, identifier, 1)
    }

    fn effect(
        &self,
        kind: OperationKind,
        handle: &EntityHandle<'_>,
        identifier: Option<Value>,
        affected: u64,
    ) -> Effect {
        Effect {
            kind,
            entity: handle.name().to_string(),
            identifier,
            affected,
        }
    }
}
