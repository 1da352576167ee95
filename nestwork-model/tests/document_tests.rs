use nestwork_model::{
    has_nested_fields, identifier_key, identifier_of, redact_fields, redacted, NodeKind, REDACTED,
};
use proptest::prelude::*;
use serde_json::{json, Value};

// ── NodeKind ─────────────────────────────────────────────────────

#[test]
fn null_is_scalar() {
    assert_eq!(NodeKind::of(&Value::Null), NodeKind::Scalar);
    assert!(!NodeKind::of(&Value::Null).is_nested());
}

#[test]
fn objects_and_arrays_are_nested() {
    assert_eq!(NodeKind::of(&json!({})), NodeKind::Object);
    assert_eq!(NodeKind::of(&json!([])), NodeKind::Array);
    assert!(NodeKind::Object.is_nested());
    assert!(NodeKind::Array.is_nested());
}

#[test]
fn nested_field_detection() {
    assert!(!has_nested_fields(&json!({"Name": "Acme", "Total": 3})));
    assert!(has_nested_fields(&json!({"Name": "Acme", "contacts": []})));
    assert!(!has_nested_fields(&json!("not an object")));
}

// ── Identifiers ──────────────────────────────────────────────────

#[test]
fn identifier_present() {
    let element = json!({"Id": 5, "Qty": 2});
    assert_eq!(identifier_of(&element, "Id"), Some(&json!(5)));
}

#[test]
fn identifier_absent_null_or_empty() {
    assert_eq!(identifier_of(&json!({"Qty": 2}), "Id"), None);
    assert_eq!(identifier_of(&json!({"Id": null}), "Id"), None);
    assert_eq!(identifier_of(&json!({"Id": ""}), "Id"), None);
}

#[test]
fn identifier_zero_is_kept() {
    assert_eq!(identifier_of(&json!({"Id": 0}), "Id"), Some(&json!(0)));
}

#[test]
fn identifier_keys_unify_numbers_and_strings() {
    assert_eq!(identifier_key(&json!(5)), "5");
    assert_eq!(identifier_key(&json!("5")), "5");
    assert_eq!(identifier_key(&json!("abc")), "abc");
}

// ── Redaction ────────────────────────────────────────────────────

#[test]
fn redacts_at_every_depth() {
    let mut doc = json!({
        "Name": "Bob",
        "password": "hunter2",
        "accounts": [{"password": "a"}, {"Login": "b"}],
        "profile": {"password": "c"}
    });
    let count = redact_fields(&mut doc, &["password".to_string()]);
    assert_eq!(count, 3);
    assert_eq!(doc["password"], REDACTED);
    assert_eq!(doc["accounts"][0]["password"], REDACTED);
    assert_eq!(doc["accounts"][1]["Login"], "b");
    assert_eq!(doc["profile"]["password"], REDACTED);
    assert_eq!(doc["Name"], "Bob");
}

#[test]
fn redacted_leaves_original_untouched() {
    let doc = json!({"password": "hunter2"});
    let copy = redacted(&doc, &["password".to_string()]);
    assert_eq!(copy["password"], REDACTED);
    assert_eq!(doc["password"], "hunter2");
}

#[test]
fn redaction_with_no_fields_is_noop() {
    let mut doc = json!({"password": "x"});
    assert_eq!(redact_fields(&mut doc, &[]), 0);
    assert_eq!(doc["password"], "x");
}

// ── Properties ───────────────────────────────────────────────────

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn flat_documents_have_no_nested_fields(
        fields in proptest::collection::btree_map("[A-Za-z]{1,6}", scalar(), 0..8)
    ) {
        let doc = Value::Object(fields.into_iter().collect());
        prop_assert!(!has_nested_fields(&doc));
    }
}
