//! SQLite-backed record store.
//!
//! Every entity lives in one `records` table keyed by `(entity, id)`; the
//! attributes are a JSON object in `data`. A transaction holds the
//! connection for its whole lifetime, so writes issued concurrently against
//! one transaction are applied one at a time.

use crate::error::{StorageError, StorageResult};
use crate::store::{Filter, StoreTransaction, TransactionalStore};
use async_trait::async_trait;
use nestwork_model::{identifier_key, identifier_of, Document, Fields};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

const RECORDS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        entity TEXT NOT NULL,
        id TEXT NOT NULL,
        data TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        modified_at INTEGER NOT NULL,
        PRIMARY KEY (entity, id)
    );
";

/// Record store over a single SQLite connection.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(RECORDS_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of records stored for `entity`.
    pub async fn count(&self, entity: &str) -> StorageResult<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE entity = ?1",
            params![entity],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[async_trait]
impl TransactionalStore for SqliteStore {
    async fn begin(&self) -> StorageResult<Box<dyn StoreTransaction>> {
        let conn = self.conn.clone().lock_owned().await;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let id = Uuid::now_v7().to_string();
        debug!("transaction {id} started");
        Ok(Box::new(SqliteTransaction {
            id,
            conn: Mutex::new(Some(conn)),
        }))
    }

    async fn find_all(&self, entity: &str) -> StorageResult<Vec<Document>> {
        let conn = self.conn.lock().await;
        select_all(&conn, entity)
    }

    async fn execute(&self, command: &str) -> StorageResult<Value> {
        let conn = self.conn.lock().await;
        execute_raw(&conn, command)
    }
}

/// A transaction on a [`SqliteStore`]. Rolled back on drop unless committed.
pub struct SqliteTransaction {
    id: String,
    conn: Mutex<Option<OwnedMutexGuard<Connection>>>,
}

impl SqliteTransaction {
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send,
        T: Send,
    {
        let state = self.conn.lock().await;
        match state.as_deref() {
            Some(conn) => f(conn),
            None => Err(StorageError::TransactionClosed(self.id.clone())),
        }
    }

    async fn finish(&self, statement: &str) -> StorageResult<()> {
        let mut state = self.conn.lock().await;
        let conn = state
            .take()
            .ok_or_else(|| StorageError::TransactionClosed(self.id.clone()))?;
        if let Err(err) = conn.execute_batch(statement) {
            // A failed COMMIT leaves the transaction open.
            let _ = conn.execute_batch("ROLLBACK");
            return Err(err.into());
        }
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take() {
            warn!("transaction {} dropped while open, rolling back", self.id);
            if let Err(err) = conn.execute_batch("ROLLBACK") {
                warn!("rollback of transaction {} failed: {err}", self.id);
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    async fn create(
        &self,
        entity: &str,
        primary_key: &str,
        attributes: Fields,
    ) -> StorageResult<Document> {
        self.with_conn(|conn| insert_record(conn, entity, primary_key, attributes))
            .await
    }

    async fn update(
        &self,
        entity: &str,
        filter: &Filter,
        attributes: &Fields,
    ) -> StorageResult<u64> {
        self.with_conn(|conn| update_records(conn, entity, filter, attributes))
            .await
    }

    async fn destroy(&self, entity: &str, filter: &Filter) -> StorageResult<u64> {
        self.with_conn(|conn| delete_records(conn, entity, filter))
            .await
    }

    async fn find_by_id(
        &self,
        entity: &str,
        identifier: &Value,
    ) -> StorageResult<Option<Document>> {
        self.with_conn(|conn| select_by_id(conn, entity, identifier))
            .await
    }

    async fn find_all(&self, entity: &str) -> StorageResult<Vec<Document>> {
        self.with_conn(|conn| select_all(conn, entity)).await
    }

    async fn execute(&self, command: &str) -> StorageResult<Value> {
        self.with_conn(|conn| execute_raw(conn, command)).await
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.finish("COMMIT").await?;
        debug!("transaction {} committed", self.id);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.finish("ROLLBACK").await?;
        debug!("transaction {} rolled back", self.id);
        Ok(())
    }
}

// ── Statements ───────────────────────────────────────────────────

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn insert_record(
    conn: &Connection,
    entity: &str,
    primary_key: &str,
    attributes: Fields,
) -> StorageResult<Document> {
    let mut record = Value::Object(attributes);
    let id = match identifier_of(&record, primary_key) {
        Some(identifier) => identifier_key(identifier),
        None => {
            let generated = Uuid::now_v7().to_string();
            record[primary_key] = Value::String(generated.clone());
            generated
        }
    };
    let now = now_millis();
    conn.execute(
        "INSERT INTO records (entity, id, data, created_at, modified_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        params![entity, id, serde_json::to_string(&record)?, now],
    )
    .map_err(|e| StorageError::from_write(entity, e))?;
    debug!("inserted {entity} {id}");
    Ok(record)
}

fn update_records(
    conn: &Connection,
    entity: &str,
    filter: &Filter,
    attributes: &Fields,
) -> StorageResult<u64> {
    let rows = select_matching(conn, entity, filter)?;
    let now = now_millis();
    for (id, mut data) in rows.iter().cloned() {
        let Some(fields) = data.as_object_mut() else {
            return Err(StorageError::InvalidData(format!(
                "{entity} {id} is not an object"
            )));
        };
        for (key, value) in attributes {
            fields.insert(key.clone(), value.clone());
        }
        conn.execute(
            "UPDATE records SET data = ?1, modified_at = ?2 WHERE entity = ?3 AND id = ?4",
            params![serde_json::to_string(&data)?, now, entity, id],
        )
        .map_err(|e| StorageError::from_write(entity, e))?;
    }
    debug!("updated {} {entity} record(s) where {filter}", rows.len());
    Ok(rows.len() as u64)
}

fn delete_records(conn: &Connection, entity: &str, filter: &Filter) -> StorageResult<u64> {
    let removed = match filter {
        Filter::Identifier(identifier) => conn.execute(
            "DELETE FROM records WHERE entity = ?1 AND id = ?2",
            params![entity, identifier_key(identifier)],
        ),
        Filter::Field { name, value } => conn.execute(
            "DELETE FROM records WHERE entity = ?1 AND json_extract(data, ?2) = ?3",
            params![entity, json_path(name), to_sql(value)],
        ),
    }
    .map_err(|e| StorageError::from_write(entity, e))?;
    debug!("deleted {removed} {entity} record(s) where {filter}");
    Ok(removed as u64)
}

fn select_by_id(
    conn: &Connection,
    entity: &str,
    identifier: &Value,
) -> StorageResult<Option<Document>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM records WHERE entity = ?1 AND id = ?2",
            params![entity, identifier_key(identifier)],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|d| serde_json::from_str::<Document>(&d))
        .transpose()
        .map_err(Into::into)
}

fn select_matching(
    conn: &Connection,
    entity: &str,
    filter: &Filter,
) -> StorageResult<Vec<(String, Value)>> {
    let mut rows = Vec::new();
    match filter {
        Filter::Identifier(identifier) => {
            let mut stmt =
                conn.prepare("SELECT id, data FROM records WHERE entity = ?1 AND id = ?2")?;
            let mapped = stmt.query_map(params![entity, identifier_key(identifier)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in mapped {
                let (id, data) = row?;
                rows.push((id, serde_json::from_str(&data)?));
            }
        }
        Filter::Field { name, value } => {
            let mut stmt = conn.prepare(
                "SELECT id, data FROM records WHERE entity = ?1 AND json_extract(data, ?2) = ?3",
            )?;
            let mapped = stmt.query_map(params![entity, json_path(name), to_sql(value)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in mapped {
                let (id, data) = row?;
                rows.push((id, serde_json::from_str(&data)?));
            }
        }
    }
    Ok(rows)
}

fn select_all(conn: &Connection, entity: &str) -> StorageResult<Vec<Document>> {
    let mut stmt =
        conn.prepare("SELECT data FROM records WHERE entity = ?1 ORDER BY created_at, rowid")?;
    let mapped = stmt.query_map(params![entity], |row| row.get::<_, String>(0))?;
    let mut records = Vec::new();
    for data in mapped {
        records.push(serde_json::from_str(&data?)?);
    }
    Ok(records)
}

/// Runs an arbitrary statement. Queries return their rows as an array of
/// objects; other statements return `{"rows_affected": n}`.
fn execute_raw(conn: &Connection, command: &str) -> StorageResult<Value> {
    let mut stmt = conn.prepare(command)?;
    if stmt.column_count() == 0 {
        let affected = stmt.execute([])?;
        return Ok(json!({ "rows_affected": affected }));
    }
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::new();
        for (i, name) in columns.iter().enumerate() {
            object.insert(name.clone(), from_sql(row.get_ref(i)?));
        }
        out.push(Value::Object(object));
    }
    Ok(Value::Array(out))
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
    }
}
