use serde_json::{Map, Value};

/// A caller-submitted payload: scalars, object nodes and array nodes.
///
/// Documents are plain JSON. The engine only ever reads them, except for
/// [`redact_fields`], which rewrites a copy before it is logged.
pub type Document = Value;

/// An object node's field map.
pub type Fields = Map<String, Value>;

/// Replacement written over sensitive values by [`redact_fields`].
pub const REDACTED: &str = "[REDACTED]";

/// Shape of a document node as seen by the resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Strings, numbers, booleans and `null`.
    Scalar,
    Object,
    Array,
}

impl NodeKind {
    /// Classifies a node. `null` counts as a scalar.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            _ => Self::Scalar,
        }
    }

    pub fn is_nested(self) -> bool {
        !matches!(self, Self::Scalar)
    }
}

/// Returns `true` if any top-level field of `document` is an object or array.
pub fn has_nested_fields(document: &Value) -> bool {
    document
        .as_object()
        .is_some_and(|fields| fields.values().any(|v| NodeKind::of(v).is_nested()))
}

/// Reads a field as an identifier.
///
/// Missing fields, `null` and the empty string all count as "no identifier".
pub fn identifier_of<'a>(element: &'a Value, field: &str) -> Option<&'a Value> {
    match element.get(field)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(other),
    }
}

/// Renders an identifier as the text key used for storage lookups.
///
/// Strings are used verbatim; every other scalar uses its JSON rendering,
/// so `5` and `"5"` map to the same key.
pub fn identifier_key(identifier: &Value) -> String {
    match identifier {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replaces every occurrence of the named fields, at any depth, with
/// [`REDACTED`]. Returns how many values were replaced.
pub fn redact_fields(document: &mut Value, fields: &[String]) -> usize {
    match document {
        Value::Object(map) => {
            let mut count = 0;
            for (key, value) in map.iter_mut() {
                if fields.iter().any(|f| f == key) {
                    *value = Value::String(REDACTED.to_string());
                    count += 1;
                } else {
                    count += redact_fields(value, fields);
                }
            }
            count
        }
        Value::Array(items) => items.iter_mut().map(|item| redact_fields(item, fields)).sum(),
        _ => 0,
    }
}

/// Returns a redacted clone of `document`, suitable for logging.
pub fn redacted(document: &Value, fields: &[String]) -> Value {
    let mut copy = document.clone();
    redact_fields(&mut copy, fields);
    copy
}
