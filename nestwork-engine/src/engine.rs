//! Caller-facing operations.

use crate::config::EngineConfig;
use crate::decompose::PayloadDecomposer;
use crate::error::{EngineError, EngineResult};
use crate::handle::EntityHandle;
use crate::include::AssociationResolver;
use crate::saga::Saga;
use crate::unit_of_work::{UnitOfWorkExecutor, UnitOfWorkReport};
use nestwork_model::{
    redacted, Document, EntitySchema, IncludeDescriptor, OperationDescriptor, SchemaRegistry,
};
use nestwork_storage::{StoreTransaction, TransactionalStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The nested-entity engine: schema registry, store and configuration.
pub struct NestedEntityEngine {
    store: Arc<dyn TransactionalStore>,
    registry: Arc<SchemaRegistry>,
    config: EngineConfig,
}

impl NestedEntityEngine {
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        registry: Arc<SchemaRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn schema(&self, entity: &str) -> EngineResult<Arc<EntitySchema>> {
        self.registry
            .lookup(entity)
            .ok_or_else(|| EngineError::UnknownEntity(entity.to_string()))
    }

    /// Persistence handle for one entity.
    pub fn handle(&self, entity: &str) -> EngineResult<EntityHandle<'_>> {
        EntityHandle::lookup(&self.registry, entity, &self.config.deletion_marker)
    }

    fn log_payload(&self, operation: &str, entity: &str, document: &Document) {
        debug!(
            "{operation} {entity}: {}",
            redacted(document, &self.config.sensitive_fields)
        );
    }

    /// The include plan a create of `document` would use.
    pub fn plan_create(
        &self,
        entity: &str,
        document: &Document,
    ) -> EngineResult<Option<Vec<IncludeDescriptor>>> {
        let schema = self.schema(entity)?;
        Ok(AssociationResolver::new(&self.registry).resolve_includes(document, &schema))
    }

    /// The flat operation list a unit of work on `document` would dispatch.
    pub fn plan_unit_of_work(
        &self,
        entity: &str,
        document: &Document,
    ) -> EngineResult<Vec<OperationDescriptor>> {
        let schema = self.schema(entity)?;
        Ok(PayloadDecomposer::new(&self.registry, &self.config.deletion_marker)
            .decompose(document, &schema)?
            .unwrap_or_default())
    }

    /// Creates `document` and every nested child it carries in one
    /// transaction. Returns the created graph.
    pub async fn create_entity(&self, entity: &str, document: &Document) -> EngineResult<Document> {
        self.log_payload("create", entity, document);
        let include = self.plan_create(entity, document)?;
        let handle = self.handle(entity)?;

        let tx = self.store.begin().await?;
        let result = handle
            .create_graph(tx.as_ref(), document, include.as_deref())
            .await;
        let created = finish(tx, result).await?;
        info!(
            "created {entity} with {} included association(s)",
            include.as_ref().map_or(0, |i| i.iter().map(IncludeDescriptor::count).sum())
        );
        Ok(created)
    }

    /// Updates the root record and applies every nested create, update and
    /// delete, atomically.
    pub async fn unit_of_work(
        &self,
        entity: &str,
        root_id: &Value,
        document: &Document,
    ) -> EngineResult<UnitOfWorkReport> {
        self.log_payload("unit of work", entity, document);
        let schema = self.schema(entity)?;
        UnitOfWorkExecutor::new(self.store.as_ref(), &self.registry, &self.config)
            .execute(schema, root_id, document)
            .await
    }

    /// Hard-deletes one record. Returns the affected count.
    pub async fn delete_entity(&self, entity: &str, identifier: &Value) -> EngineResult<u64> {
        let handle = self.handle(entity)?;
        let tx = self.store.begin().await?;
        let result = handle.destroy(tx.as_ref(), identifier).await;
        let affected = finish(tx, result).await?;
        info!("deleted {affected} {entity} record(s) with id {identifier}");
        Ok(affected)
    }

    /// Every record of `entity`. No pagination.
    pub async fn list_entities(&self, entity: &str) -> EngineResult<Vec<Document>> {
        self.schema(entity)?;
        Ok(self.store.find_all(entity).await?)
    }

    /// Runs a raw store command, optionally inside its own transaction.
    pub async fn run_command(&self, command: &str, transactional: bool) -> EngineResult<Value> {
        debug!("running command (transactional={transactional}): {command}");
        if !transactional {
            return Ok(self.store.execute(command).await?);
        }
        let tx = self.store.begin().await?;
        let result = tx.execute(command).await.map_err(EngineError::from);
        finish(tx, result).await
    }

    /// Creates `document`, then runs `saga` against the committed graph.
    ///
    /// If a step fails, earlier steps are compensated and the created graph
    /// is removed again in a new transaction.
    pub async fn create_entity_with_saga(
        &self,
        entity: &str,
        document: &Document,
        saga: &Saga,
    ) -> EngineResult<Document> {
        let created = self.create_entity(entity, document).await?;
        let outcome = saga.run(&created).await;
        let Err(failure) = outcome else {
            return Ok(created);
        };
        for err in &failure.compensation_errors {
            warn!("saga for {entity} left an uncompensated step: {err}");
        }

        let include = self.plan_create(entity, document)?;
        let handle = self.handle(entity)?;
        let tx = self.store.begin().await?;
        let result = handle
            .destroy_graph(tx.as_ref(), &created, include.as_deref())
            .await;
        match finish(tx, result).await {
            Ok(removed) => info!("saga compensation removed {removed} {entity} graph record(s)"),
            Err(err) => warn!("saga compensation for {entity} failed: {err}"),
        }
        Err(EngineError::Saga {
            step: failure.step,
            message: failure.message,
        })
    }
}

/// Commits on success, rolls back on failure, and returns the original
/// result (or the commit error).
async fn finish<T>(tx: Box<dyn StoreTransaction>, result: EngineResult<T>) -> EngineResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}
