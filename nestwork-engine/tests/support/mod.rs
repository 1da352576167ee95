//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use nestwork_engine::{EngineConfig, NestedEntityEngine};
use nestwork_model::{Document, EntitySchema, Fields, SchemaRegistry};
use nestwork_storage::{
    Filter, SqliteStore, StorageError, StorageResult, StoreTransaction, TransactionalStore,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Invoice → items → parts, company → contacts, plus a standalone address.
pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .register(EntitySchema::new("invoice").associate_via("items", "item", "invoice_id"))
        .register(EntitySchema::new("item").associate_via("parts", "part", "item_id"))
        .register(EntitySchema::new("part"))
        .register(EntitySchema::new("company").associate("contacts", "contact"))
        .register(EntitySchema::new("contact"))
        .register(EntitySchema::new("address"))
}

/// Counts storage calls and fails the Nth one (1-based), if asked to.
pub struct FaultyStore {
    pub inner: Arc<SqliteStore>,
    fail_on: Option<usize>,
    calls: Arc<AtomicUsize>,
    begins: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            fail_on: None,
            calls: Arc::new(AtomicUsize::new(0)),
            begins: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(inner: Arc<SqliteStore>, call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::new(inner)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionalStore for FaultyStore {
    async fn begin(&self) -> StorageResult<Box<dyn StoreTransaction>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTransaction {
            inner,
            fail_on: self.fail_on,
            calls: self.calls.clone(),
        }))
    }

    async fn find_all(&self, entity: &str) -> StorageResult<Vec<Document>> {
        self.inner.find_all(entity).await
    }

    async fn execute(&self, command: &str) -> StorageResult<Value> {
        self.inner.execute(command).await
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    fail_on: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl FaultyTransaction {
    fn tick(&self, entity: &str) -> StorageResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(StorageError::Constraint {
                entity: entity.to_string(),
                detail: format!("injected failure on call {call}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn create(
        &self,
        entity: &str,
        primary_key: &str,
        attributes: Fields,
    ) -> StorageResult<Document> {
        self.tick(entity)?;
        self.inner.create(entity, primary_key, attributes).await
    }

    async fn update(
        &self,
        entity: &str,
        filter: &Filter,
        attributes: &Fields,
    ) -> StorageResult<u64> {
        self.tick(entity)?;
        self.inner.update(entity, filter, attributes).await
    }

    async fn destroy(&self, entity: &str, filter: &Filter) -> StorageResult<u64> {
        self.tick(entity)?;
        self.inner.destroy(entity, filter).await
    }

    async fn find_by_id(
        &self,
        entity: &str,
        identifier: &Value,
    ) -> StorageResult<Option<Document>> {
        self.tick(entity)?;
        self.inner.find_by_id(entity, identifier).await
    }

    async fn find_all(&self, entity: &str) -> StorageResult<Vec<Document>> {
        self.inner.find_all(entity).await
    }

    async fn execute(&self, command: &str) -> StorageResult<Value> {
        self.inner.execute(command).await
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.inner.rollback().await
    }
}

pub fn engine_over(store: Arc<dyn TransactionalStore>, config: EngineConfig) -> NestedEntityEngine {
    NestedEntityEngine::new(store, Arc::new(registry()), config)
}

/// Inserts records directly, committed.
pub async fn seed(store: &SqliteStore, entity: &str, records: &[Value]) {
    let tx = store.begin().await.unwrap();
    for record in records {
        tx.create(entity, "Id", record.as_object().cloned().unwrap())
            .await
            .unwrap();
    }
    tx.commit().await.unwrap();
}

/// Snapshot of every table the fixtures touch, for before/after comparisons.
pub async fn snapshot(store: &SqliteStore) -> Vec<(String, Vec<Document>)> {
    let mut out = Vec::new();
    for entity in ["invoice", "item", "part", "company", "contact", "address"] {
        out.push((entity.to_string(), store.find_all(entity).await.unwrap()));
    }
    out
}
