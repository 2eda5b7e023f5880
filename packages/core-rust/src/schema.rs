//! Declarative record schemas.
//!
//! A [`Schema`] maps field names to [`SchemaNode`]s. A node is a primitive
//! kind, an array of a primitive kind, or a nested schema. Validation and
//! default construction are structural recursions over this tree.
//!
//! Schemas deserialize from the compact JSON shorthand used in model
//! definitions:
//!
//! ```json
//! { "name": "string", "tags": ["string"], "address": { "city": "string" } }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{json_type_name, Document, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};

/// Primitive value kinds a field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
}

impl FieldKind {
    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Type-appropriate empty value used when backfilling.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Number => Value::from(0),
            Self::Boolean => Value::Bool(false),
        }
    }

    /// Whether `value`'s runtime kind is exactly this kind. `null` matches nothing.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Number, Value::Number(_))
                | (Self::Boolean, Value::Bool(_))
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of a single schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NodeRepr", into = "NodeRepr")]
pub enum SchemaNode {
    /// A scalar of the given kind.
    Primitive(FieldKind),
    /// An array whose every element is of the given kind.
    ArrayOf(FieldKind),
    /// A nested object with its own schema.
    Object(Schema),
}

impl SchemaNode {
    pub const STRING: Self = Self::Primitive(FieldKind::String);
    pub const NUMBER: Self = Self::Primitive(FieldKind::Number);
    pub const BOOLEAN: Self = Self::Primitive(FieldKind::Boolean);

    /// Shorthand for [`SchemaNode::ArrayOf`].
    #[must_use]
    pub fn array_of(kind: FieldKind) -> Self {
        Self::ArrayOf(kind)
    }

    /// Shorthand for [`SchemaNode::Object`].
    #[must_use]
    pub fn object(schema: Schema) -> Self {
        Self::Object(schema)
    }

    /// Default value for a freshly backfilled field.
    ///
    /// Objects default recursively, so every nested field is present.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            Self::Primitive(kind) => kind.default_value(),
            Self::ArrayOf(_) => Value::Array(Vec::new()),
            Self::Object(schema) => Value::Object(schema.default_document()),
        }
    }

    /// Human-readable expected type, as used in error messages.
    #[must_use]
    pub fn expected(&self) -> &'static str {
        match self {
            Self::Primitive(kind) => kind.as_str(),
            Self::ArrayOf(_) => "array",
            Self::Object(_) => "object",
        }
    }

    fn validate_at(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        match self {
            Self::Primitive(kind) => {
                if kind.matches(value) {
                    Ok(())
                } else {
                    Err(ValidationError::type_mismatch(path, kind.as_str(), value))
                }
            }
            Self::ArrayOf(kind) => {
                let Value::Array(items) = value else {
                    return Err(ValidationError::type_mismatch(path, "array", value));
                };
                for (index, item) in items.iter().enumerate() {
                    if !kind.matches(item) {
                        return Err(ValidationError::type_mismatch(
                            &format!("{path}[{index}]"),
                            kind.as_str(),
                            item,
                        ));
                    }
                }
                Ok(())
            }
            Self::Object(schema) => {
                let Value::Object(inner) = value else {
                    return Err(ValidationError::type_mismatch(path, "object", value));
                };
                schema.validate_prefixed(Some(path), inner)
            }
        }
    }
}

/// Wire shape of a [`SchemaNode`]: `"kind"`, `["kind"]` or `{ ... }`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NodeRepr {
    Primitive(FieldKind),
    Array(Vec<FieldKind>),
    Object(Schema),
}

impl TryFrom<NodeRepr> for SchemaNode {
    type Error = String;

    fn try_from(repr: NodeRepr) -> Result<Self, Self::Error> {
        match repr {
            NodeRepr::Primitive(kind) => Ok(Self::Primitive(kind)),
            NodeRepr::Array(kinds) => match kinds.as_slice() {
                [kind] => Ok(Self::ArrayOf(*kind)),
                _ => Err(format!(
                    "array schema must name exactly one element kind, got {}",
                    kinds.len()
                )),
            },
            NodeRepr::Object(schema) => Ok(Self::Object(schema)),
        }
    }
}

impl From<SchemaNode> for NodeRepr {
    fn from(node: SchemaNode) -> Self {
        match node {
            SchemaNode::Primitive(kind) => Self::Primitive(kind),
            SchemaNode::ArrayOf(kind) => Self::Array(vec![kind]),
            SchemaNode::Object(schema) => Self::Object(schema),
        }
    }
}

/// Error raised when a document does not satisfy a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
    #[error("invalid type for field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl ValidationError {
    fn type_mismatch(path: &str, expected: &'static str, value: &Value) -> Self {
        Self::TypeMismatch {
            field: path.to_string(),
            expected,
            actual: json_type_name(value),
        }
    }

    /// Path of the offending field (`address.city`, `tags[2]`).
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field } | Self::TypeMismatch { field, .. } => field,
        }
    }
}

/// Field-name to type mapping describing a record shape.
///
/// Fields iterate in name order, which keeps defaults and error reporting
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, SchemaNode>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field declaration.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.fields.insert(name.into(), node);
        self
    }

    /// Effective collection schema: `id`, `created_at`, `updated_at` (all
    /// strings) plus the caller's fields.
    ///
    /// The base triplet always wins; a caller redeclaring one of those keys
    /// with another type is ignored.
    #[must_use]
    pub fn with_base_fields(caller: Schema) -> Self {
        let mut fields = caller.fields;
        for base in [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD] {
            fields.insert(base.to_string(), SchemaNode::STRING);
        }
        Self { fields }
    }

    /// Looks up the node declared for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.fields.get(name)
    }

    /// Whether `name` is a declared field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates declared fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.fields.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema declares no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks that every declared field is present and well-typed.
    ///
    /// Undeclared extra fields are tolerated.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, walking fields in name order.
    pub fn validate(&self, doc: &Document) -> Result<(), ValidationError> {
        self.validate_prefixed(None, doc)
    }

    fn validate_prefixed(
        &self,
        prefix: Option<&str>,
        doc: &Document,
    ) -> Result<(), ValidationError> {
        for (name, node) in &self.fields {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{name}"),
                None => name.clone(),
            };
            let Some(value) = doc.get(name) else {
                return Err(ValidationError::MissingField { field: path });
            };
            node.validate_at(&path, value)?;
        }
        Ok(())
    }

    /// A document holding the default value of every declared field.
    #[must_use]
    pub fn default_document(&self) -> Document {
        self.fields
            .iter()
            .map(|(name, node)| (name.clone(), node.default_value()))
            .collect()
    }

    /// Inserts defaults for declared top-level fields missing from `doc`.
    ///
    /// Returns `true` if anything was added. Existing values are never
    /// touched, even when their type no longer matches.
    pub fn backfill(&self, doc: &mut Document) -> bool {
        let mut changed = false;
        for (name, node) in &self.fields {
            if !doc.contains_key(name) {
                doc.insert(name.clone(), node.default_value());
                changed = true;
            }
        }
        changed
    }

    /// Copy of `doc` restricted to declared top-level fields.
    #[must_use]
    pub fn retain_declared(&self, doc: &Document) -> Document {
        doc.iter()
            .filter(|(name, _)| self.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, SchemaNode)> for Schema {
    fn from_iter<I: IntoIterator<Item = (K, SchemaNode)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
        }
    }
}
