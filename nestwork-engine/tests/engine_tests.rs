//! Caller-facing engine operations.

mod support;

use async_trait::async_trait;
use nestwork_engine::{
    load_registry, registry_from_toml_str, BatchOrder, EngineConfig, ErrorKind, NestedEntityEngine,
    Saga, SagaStep,
};
use nestwork_model::{Document, OperationKind};
use nestwork_storage::SqliteStore;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use support::{engine_over, snapshot, FaultyStore};

fn engine() -> (NestedEntityEngine, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    (engine_over(store.clone(), EngineConfig::default()), store)
}

// ── Nested create ────────────────────────────────────────────────

#[tokio::test]
async fn create_writes_owner_and_children_with_foreign_keys() {
    let (engine, store) = engine();
    let created = engine
        .create_entity(
            "company",
            &json!({"Id": "c1", "Name": "Acme", "contacts": [{"Name": "Bob"}, {"Name": "Ann"}]}),
        )
        .await
        .unwrap();

    assert_eq!(created["Name"], json!("Acme"));
    let contacts = created["contacts"].as_array().unwrap();
    assert_eq!(contacts.len(), 2);
    assert!(contacts.iter().all(|c| c["company_id"] == json!("c1")));
    assert!(contacts.iter().all(|c| c["Id"].is_string()));

    assert_eq!(store.count("company").await.unwrap(), 1);
    let stored = engine.list_entities("contact").await.unwrap();
    let names: Vec<&Value> = stored.iter().map(|c| &c["Name"]).collect();
    assert_eq!(names, vec![&json!("Bob"), &json!("Ann")]);

    let company = &engine.list_entities("company").await.unwrap()[0];
    assert!(company.get("contacts").is_none(), "children are separate rows");
}

#[tokio::test]
async fn create_links_generated_owner_identifier() {
    let (engine, _store) = engine();
    let created = engine
        .create_entity(
            "invoice",
            &json!({"Total": 5, "items": [{"Sku": "A", "parts": [{"Code": "p"}]}]}),
        )
        .await
        .unwrap();

    let invoice_id = created["Id"].clone();
    assert!(invoice_id.is_string());
    let item = &created["items"][0];
    assert_eq!(item["invoice_id"], invoice_id);
    assert_eq!(item["parts"][0]["item_id"], item["Id"]);
}

#[tokio::test]
async fn create_with_object_child() {
    let (engine, _store) = engine();
    let created = engine
        .create_entity("company", &json!({"Id": 3, "address": {"Street": "Main"}}))
        .await
        .unwrap();
    assert_eq!(created["address"]["company_id"], json!(3));
    assert_eq!(engine.list_entities("address").await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_create_leaves_nothing_behind() {
    let (engine, store) = engine();
    let document = json!({
        "Name": "Acme",
        "contacts": [{"Id": "dup", "Name": "Bob"}, {"Id": "dup", "Name": "Ann"}]
    });

    let err = engine.create_entity("company", &document).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(store.count("company").await.unwrap(), 0);
    assert_eq!(store.count("contact").await.unwrap(), 0);
}

#[tokio::test]
async fn injected_create_failure_rolls_back() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let before = snapshot(&store).await;
    let engine = engine_over(
        Arc::new(FaultyStore::failing_on(store.clone(), 3)),
        EngineConfig::default(),
    );

    let err = engine
        .create_entity("company", &json!({"contacts": [{"Name": "a"}, {"Name": "b"}]}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(snapshot(&store).await, before);
}

#[tokio::test]
async fn plans_are_exposed_without_writing() {
    let (engine, store) = engine();
    let plan = engine
        .plan_create("company", &json!({"contacts": [{"Name": "Bob"}]}))
        .unwrap()
        .unwrap();
    assert_eq!(plan[0].foreign_key, "company_id");
    let operations = engine
        .plan_unit_of_work("invoice", &json!({"items": [{"Id": 1}, {"Qty": 1}]}))
        .unwrap();

    let kinds: Vec<OperationKind> = operations.iter().map(|o| o.kind).collect();
    assert_eq!(kinds, vec![OperationKind::Update, OperationKind::Create]);
    assert_eq!(store.count("item").await.unwrap(), 0);
}

// ── Unit of work, delete, list ───────────────────────────────────

#[tokio::test]
async fn unit_of_work_through_engine() {
    let (engine, store) = engine();
    engine
        .create_entity("invoice", &json!({"Id": 1, "Total": 1, "items": [{"Id": 5, "Qty": 1}]}))
        .await
        .unwrap();

    let report = engine
        .unit_of_work(
            "invoice",
            &json!(1),
            &json!({"Total": 2, "items": [{"Id": 5, "marked_as_deleted": true}, {"Qty": 3}]}),
        )
        .await
        .unwrap();

    assert_eq!((report.created, report.updated, report.deleted), (1, 0, 1));
    assert_eq!(store.count("item").await.unwrap(), 1);
    assert_eq!(engine.list_entities("invoice").await.unwrap()[0]["Total"], json!(2));
}

#[tokio::test]
async fn delete_entity_reports_affected_rows() {
    let (engine, _store) = engine();
    engine
        .create_entity("contact", &json!({"Id": 7, "Name": "Bob"}))
        .await
        .unwrap();

    assert_eq!(engine.delete_entity("contact", &json!(7)).await.unwrap(), 1);
    assert_eq!(engine.delete_entity("contact", &json!(7)).await.unwrap(), 0);
    assert!(engine.list_entities("contact").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_entity_is_a_resolution_error() {
    let (engine, _store) = engine();
    let errors = [
        engine.create_entity("ghost", &json!({})).await.unwrap_err(),
        engine.unit_of_work("ghost", &json!(1), &json!({})).await.unwrap_err(),
        engine.delete_entity("ghost", &json!(1)).await.unwrap_err(),
        engine.list_entities("ghost").await.unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert_eq!(err.to_string(), "unknown entity: ghost");
    }
}

// ── Raw commands ─────────────────────────────────────────────────

#[tokio::test]
async fn run_command_with_and_without_transaction() {
    let (engine, _store) = engine();
    engine
        .create_entity("contact", &json!({"Id": 1, "Name": "Bob"}))
        .await
        .unwrap();

    let rows = engine
        .run_command("SELECT id FROM records WHERE entity = 'contact'", false)
        .await
        .unwrap();
    assert_eq!(rows, json!([{"id": "1"}]));

    let result = engine
        .run_command("DELETE FROM records WHERE entity = 'contact'", true)
        .await
        .unwrap();
    assert_eq!(result, json!({"rows_affected": 1}));
    assert!(engine.list_entities("contact").await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_command_is_a_storage_error() {
    let (engine, _store) = engine();
    let err = engine.run_command("SELEC nonsense", true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

// ── Sagas ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct Step {
    name: &'static str,
    fail: bool,
    journal: Journal,
}

#[async_trait]
impl SagaStep for Step {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, created: &Document) -> Result<(), String> {
        if self.fail {
            return Err("remote refused".to_string());
        }
        self.journal
            .push(format!("{} {}", self.name, created["Id"]));
        Ok(())
    }

    async fn compensate(&self, _created: &Document) -> Result<(), String> {
        self.journal.push(format!("undo {}", self.name));
        Ok(())
    }
}

fn step(name: &'static str, fail: bool, journal: &Journal) -> Step {
    Step {
        name,
        fail,
        journal: journal.clone(),
    }
}

#[tokio::test]
async fn saga_runs_after_commit() {
    let (engine, store) = engine();
    let journal = Journal::default();
    let saga = Saga::new()
        .step(step("replicate", false, &journal))
        .step(step("assign_roles", false, &journal));

    engine
        .create_entity_with_saga("company", &json!({"Id": "c9", "contacts": [{"Name": "x"}]}), &saga)
        .await
        .unwrap();

    assert_eq!(journal.entries(), vec!["replicate \"c9\"", "assign_roles \"c9\""]);
    assert_eq!(store.count("contact").await.unwrap(), 1);
}

#[tokio::test]
async fn failed_saga_compensates_and_removes_graph() {
    let (engine, store) = engine();
    let journal = Journal::default();
    let saga = Saga::new()
        .step(step("replicate", false, &journal))
        .step(step("notify", false, &journal))
        .step(step("assign_roles", true, &journal));

    let err = engine
        .create_entity_with_saga(
            "company",
            &json!({"Id": "c9", "contacts": [{"Name": "x"}, {"Name": "y"}]}),
            &saga,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Saga);
    assert_eq!(err.to_string(), "saga step 'assign_roles' failed: remote refused");
    assert_eq!(
        journal.entries(),
        vec!["replicate \"c9\"", "notify \"c9\"", "undo notify", "undo replicate"]
    );
    assert_eq!(store.count("company").await.unwrap(), 0);
    assert_eq!(store.count("contact").await.unwrap(), 0);
}

// ── Configuration ────────────────────────────────────────────────

#[test]
fn config_defaults_fill_missing_keys() {
    let config = EngineConfig::from_toml_str("batch_order = \"parent_first\"").unwrap();
    assert_eq!(config.batch_order, BatchOrder::ParentFirst);
    assert_eq!(config.deletion_marker, "marked_as_deleted");
    assert_eq!(config.sensitive_fields, vec!["password".to_string()]);
    assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
}

#[test]
fn config_rejects_unknown_batch_order() {
    let err = EngineConfig::from_toml_str("batch_order = \"random\"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn registry_loads_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.toml");
    std::fs::write(
        &path,
        r#"
[[entities]]
name = "company"
associations = [{ key = "staff", entity = "contact", foreign_key = "employer" }]

[[entities]]
name = "contact"
primary_key = "uid"
"#,
    )
    .unwrap();

    let registry = load_registry(&path).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.lookup("contact").unwrap().primary_key, "uid");
    assert_eq!(registry.lookup("company").unwrap().primary_key, "Id");
    let association = registry.lookup("company").unwrap().association("staff").cloned().unwrap();
    assert_eq!(association.foreign_key_for("company"), "employer");
}

#[test]
fn registry_rejects_dangling_association() {
    let err = registry_from_toml_str(
        r#"
[[entities]]
name = "company"
associations = [{ key = "contacts", entity = "contact" }]
"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn custom_marker_from_config() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let config = EngineConfig::from_toml_str("deletion_marker = \"_destroy\"").unwrap();
    let engine = engine_over(store.clone(), config);
    engine
        .create_entity("invoice", &json!({"Id": 1, "items": [{"Id": 2}]}))
        .await
        .unwrap();

    let report = engine
        .unit_of_work("invoice", &json!(1), &json!({"items": [{"Id": 2, "_destroy": true}]}))
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(store.count("item").await.unwrap(), 0);
}
