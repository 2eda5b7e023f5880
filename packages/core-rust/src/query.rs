//! Client-side filter, sort and pagination engine.
//!
//! Collections read whole partitions and compose these stages in memory:
//! [`Where`] predicates (conjunctive), [`OrderBy`] sorting, [`Pagination`]
//! slicing, and field projection/exclusion.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{array_contains, compare_values, values_equal, Document, CREATED_AT_FIELD};

/// Errors raised while evaluating a query against documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("field {field} does not exist in data")]
    MissingField { field: String },
    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },
}

/// Comparison operator of a [`Where`] predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    NotIn,
    ArrayContains,
    ArrayContainsAny,
}

impl Operator {
    pub const ALL: [Self; 10] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Gt,
        Self::Le,
        Self::Ge,
        Self::In,
        Self::NotIn,
        Self::ArrayContains,
        Self::ArrayContainsAny,
    ];

    /// Wire spelling of the operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
        }
    }

    /// Applies the operator with the document's field value on the left.
    ///
    /// Set operators (`in`, `not-in`, `array-contains-any`) require `operand`
    /// to be an array and evaluate to `false` otherwise.
    #[must_use]
    pub fn evaluate(self, field_value: &Value, operand: &Value) -> bool {
        match self {
            Self::Eq => values_equal(field_value, operand),
            Self::Ne => !values_equal(field_value, operand),
            Self::Lt => compare_values(field_value, operand) == Some(Ordering::Less),
            Self::Gt => compare_values(field_value, operand) == Some(Ordering::Greater),
            Self::Le => matches!(
                compare_values(field_value, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Ge => matches!(
                compare_values(field_value, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::In => array_contains(operand, field_value),
            Self::NotIn => operand.is_array() && !array_contains(operand, field_value),
            Self::ArrayContains => array_contains(field_value, operand),
            Self::ArrayContainsAny => operand
                .as_array()
                .is_some_and(|wanted| wanted.iter().any(|w| array_contains(field_value, w))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| QueryError::UnsupportedOperator {
                operator: s.to_string(),
            })
    }
}

impl TryFrom<String> for Operator {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

/// A single `(field, operator, value)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Where {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Where {
    #[must_use]
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Builds a predicate from an operator's string spelling.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedOperator`] for unknown spellings.
    pub fn parse(
        field: impl Into<String>,
        operator: &str,
        value: Value,
    ) -> Result<Self, QueryError> {
        Ok(Self::new(field, operator.parse()?, value))
    }

    /// Evaluates the predicate against a document.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MissingField`] if the document lacks the field.
    /// A field explicitly set to `null` counts as present.
    pub fn matches(&self, doc: &Document) -> Result<bool, QueryError> {
        let field_value = doc.get(&self.field).ok_or_else(|| QueryError::MissingField {
            field: self.field.clone(),
        })?;
        Ok(self.operator.evaluate(field_value, &self.value))
    }

    /// Like [`Where::matches`] but treats a missing field as a non-match.
    #[must_use]
    pub fn matches_lenient(&self, doc: &Document) -> bool {
        doc.get(&self.field)
            .is_some_and(|field_value| self.operator.evaluate(field_value, &self.value))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Sort key for `search_wheres`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl OrderBy {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Three-way comparison of two present field values in this direction.
    ///
    /// Values without a mutual ordering compare equal, keeping their
    /// relative order under a stable sort.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = compare_values(a, b).unwrap_or(Ordering::Equal);
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

impl Default for OrderBy {
    /// Oldest first by `created_at`.
    fn default() -> Self {
        Self::asc(CREATED_AT_FIELD)
    }
}

/// Offset-then-limit slicing. An absent stage is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Pagination {
    #[must_use]
    pub fn new(offset: Option<usize>, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }

    /// Skips `offset` items, then keeps at most `limit`.
    #[must_use]
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let skipped = items.into_iter().skip(self.offset.unwrap_or(0));
        match self.limit {
            Some(limit) => skipped.take(limit).collect(),
            None => skipped.collect(),
        }
    }
}

/// Keeps the documents satisfying every predicate.
///
/// # Errors
///
/// Fails the whole scan with [`QueryError::MissingField`] on the first
/// document lacking a predicate field.
pub fn filter_documents<I>(docs: I, wheres: &[Where]) -> Result<Vec<Document>, QueryError>
where
    I: IntoIterator<Item = Document>,
{
    let mut kept = Vec::new();
    for doc in docs {
        let mut keep = true;
        for predicate in wheres {
            if !predicate.matches(&doc)? {
                keep = false;
                break;
            }
        }
        if keep {
            kept.push(doc);
        }
    }
    Ok(kept)
}

/// Stable in-place sort by `order`.
///
/// # Errors
///
/// With two or more documents, fails with [`QueryError::MissingField`] if any
/// of them lacks the sort field. Zero or one documents are never compared.
pub fn sort_documents(docs: &mut [Document], order: &OrderBy) -> Result<(), QueryError> {
    if docs.len() < 2 {
        return Ok(());
    }
    if docs.iter().any(|doc| !doc.contains_key(&order.field)) {
        return Err(QueryError::MissingField {
            field: order.field.clone(),
        });
    }
    docs.sort_by(|a, b| order.compare(&a[&order.field], &b[&order.field]));
    Ok(())
}

/// Removes the named fields from every document.
#[must_use]
pub fn exclude_fields(docs: Vec<Document>, fields: &[String]) -> Vec<Document> {
    if fields.is_empty() {
        return docs;
    }
    docs.into_iter()
        .map(|mut doc| {
            for field in fields {
                doc.remove(field);
            }
            doc
        })
        .collect()
}

/// Keeps only the named fields; names absent from a document are omitted.
#[must_use]
pub fn project_fields(docs: &[Document], fields: &[String]) -> Vec<Document> {
    docs.iter()
        .map(|doc| {
            fields
                .iter()
                .filter_map(|field| doc.get(field).map(|value| (field.clone(), value.clone())))
                .collect()
        })
        .collect()
}
