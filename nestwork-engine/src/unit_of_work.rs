//! Unit-of-work executor: the root update plus every decomposed child
//! operation, committed or rolled back together.

use crate::config::{BatchOrder, EngineConfig};
use crate::decompose::PayloadDecomposer;
use crate::error::EngineResult;
use crate::handle::EntityHandle;
use crate::resolve::{Effect, OperationResolver};
use futures::future::join_all;
use nestwork_model::{Document, EntitySchema, OperationDescriptor, OperationKind, SchemaRegistry};
use nestwork_storage::{StoreTransaction, TransactionalStore};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a committed unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnitOfWorkReport {
    /// Rows matched by the root update. Zero is not an error.
    pub root_affected: u64,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub effects: Vec<Effect>,
}

impl UnitOfWorkReport {
    fn record(&mut self, effect: Effect) {
        match effect.kind {
            OperationKind::Create => self.created += 1,
            OperationKind::Update => self.updated += 1,
            OperationKind::Delete => self.deleted += 1,
        }
        self.effects.push(effect);
    }

    /// Total child operations applied.
    pub fn operations(&self) -> usize {
        self.effects.len()
    }
}

pub struct UnitOfWorkExecutor<'a> {
    store: &'a dyn TransactionalStore,
    registry: &'a SchemaRegistry,
    config: &'a EngineConfig,
}

impl<'a> UnitOfWorkExecutor<'a> {
    pub fn new(
        store: &'a dyn TransactionalStore,
        registry: &'a SchemaRegistry,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Updates the `root` record identified by `root_id` with the payload's
    /// attributes and applies every nested node, in one transaction.
    ///
    /// Decomposition (and its validation) happens before the transaction
    /// opens. Any failure afterwards rolls the whole batch back and is
    /// returned unchanged.
    pub async fn execute(
        &self,
        root: Arc<EntitySchema>,
        root_id: &Value,
        document: &Document,
    ) -> EngineResult<UnitOfWorkReport> {
        let marker = self.config.deletion_marker.as_str();
        let descriptors = PayloadDecomposer::new(self.registry, marker)
            .decompose(document, &root)?
            .unwrap_or_default();
        debug!(
            "unit of work on {} {root_id}: {} child operation(s)",
            root.name,
            descriptors.len()
        );

        let tx = self.store.begin().await?;
        let result = self
            .dispatch(tx.as_ref(), root.clone(), root_id, document, &descriptors)
            .await;

        match result {
            Ok(report) => {
                let tx_id = tx.id().to_string();
                tx.commit().await?;
                info!(
                    "unit of work on {} {root_id} committed in {tx_id}: {} created, {} updated, {} deleted",
                    root.name, report.created, report.updated, report.deleted
                );
                Ok(report)
            }
            Err(err) => {
                warn!("unit of work on {} {root_id} failed, rolling back: {err}", root.name);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    async fn dispatch(
        &self,
        tx: &dyn StoreTransaction,
        root: Arc<EntitySchema>,
        root_id: &Value,
        document: &Document,
        descriptors: &[OperationDescriptor],
    ) -> EngineResult<UnitOfWorkReport> {
        let marker = self.config.deletion_marker.as_str();
        let root_handle = EntityHandle::new(root, self.registry, marker);
        let resolver = OperationResolver::new(self.registry, marker);

        match self.config.batch_order {
            BatchOrder::Concurrent => {
                let root_update = root_handle.update(tx, root_id, document);
                let children = join_all(descriptors.iter().map(|d| resolver.resolve(d, tx)));
                // Every task is awaited before the first failure is reported.
                let (root_affected, effects) = futures::join!(root_update, children);

                let mut report = UnitOfWorkReport {
                    root_affected: root_affected?,
                    ..Default::default()
                };
                for effect in effects {
                    report.record(effect?);
                }
                Ok(report)
            }
            BatchOrder::ParentFirst => {
                let mut report = UnitOfWorkReport {
                    root_affected: root_handle.update(tx, root_id, document).await?,
                    ..Default::default()
                };
                let mut ordered: Vec<&OperationDescriptor> = descriptors.iter().collect();
                ordered.sort_by_key(|d| d.depth);
                for descriptor in ordered {
                    report.record(resolver.resolve(descriptor, tx).await?);
                }
                Ok(report)
            }
        }
    }
}
