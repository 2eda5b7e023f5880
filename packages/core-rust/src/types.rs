//! Document representation shared by every layer.
//!
//! Records are plain JSON objects. The helpers here give them the loose
//! comparison semantics the query engine and relation matcher rely on:
//! numbers compare by numeric value regardless of integer/float encoding,
//! and only like-typed scalars are ordered.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// A stored record: field name to JSON value.
///
/// Every persisted document carries an `id` string that doubles as its
/// storage key.
pub type Document = Map<String, Value>;

/// Field that holds a document's storage key.
pub const ID_FIELD: &str = "id";
/// Field stamped once when a document is created.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Field refreshed on every write.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Converts a JSON value into a [`Document`] if it is an object.
#[must_use]
pub fn into_document(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Returns the `id` field of a document when it is a string.
#[must_use]
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Name of a value's runtime kind, as reported in validation errors.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strict equality with numeric normalization.
///
/// `1` and `1.0` are equal; everything else compares structurally.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Three-way comparison for like-typed scalars.
///
/// Numbers compare numerically, strings lexicographically by byte, booleans
/// with `false < true`. Mixed or compound operands have no ordering.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Returns `true` if `haystack` is an array holding an element equal to `needle`.
#[must_use]
pub fn array_contains(haystack: &Value, needle: &Value) -> bool {
    haystack
        .as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(item, needle)))
}
