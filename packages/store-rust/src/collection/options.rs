use serde::{Deserialize, Serialize};
use serde_json::Value;
use voyage_core::Pagination;

/// Arguments of `read_with_options_and_fields`: pagination, then the fields
/// to strip from each result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    #[serde(default)]
    pub options: Pagination,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ReadOptions {
    #[must_use]
    pub fn new(offset: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            options: Pagination::new(offset, limit),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn without<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }
}

/// Single-predicate search followed by pagination and field exclusion.
///
/// `operator` keeps its wire spelling so an unknown operator surfaces as an
/// error from the search itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSearch {
    pub field: String,
    pub operator: String,
    pub value: Value,
    #[serde(default)]
    pub options: Pagination,
    #[serde(default, alias = "withOutFields")]
    pub without_fields: Vec<String>,
}

impl AdvancedSearch {
    #[must_use]
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
            options: Pagination::default(),
            without_fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn paginate(mut self, offset: Option<usize>, limit: Option<usize>) -> Self {
        self.options = Pagination::new(offset, limit);
        self
    }

    #[must_use]
    pub fn without<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.without_fields.extend(fields.into_iter().map(Into::into));
        self
    }
}

/// Outcome of a self-heal pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealReport {
    /// Documents read from the store.
    pub scanned: usize,
    /// Documents that needed at least one default backfilled.
    pub healed: usize,
}
