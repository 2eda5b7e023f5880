//! Document store trait, write batches, and the native query builder.
//!
//! [`DocumentStore`] is the persistence boundary beneath every
//! [`Collection`](crate::collection::Collection): a set of named partitions,
//! each mapping document ids to JSON objects. Implementations must apply a
//! [`WriteBatch`] atomically. Filtering beyond full scans is optional; the
//! default [`DocumentStore::query`] evaluates a [`NativeQuery`] over
//! [`DocumentStore::get_all`].

use std::cmp::Ordering;

use async_trait::async_trait;
use voyage_core::{Document, Operator, OrderBy, Where};

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace the whole document.
    Set {
        partition: String,
        id: String,
        doc: Document,
    },
    /// Merge top-level fields into an existing document.
    Update {
        partition: String,
        id: String,
        fields: Document,
    },
    /// Remove the document. Deleting an absent id is not an error.
    Delete { partition: String, id: String },
}

/// Commit guard: the document must still equal `expected` (`None` = absent).
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    pub partition: String,
    pub id: String,
    pub expected: Option<Document>,
}

/// An ordered list of writes committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    preconditions: Vec<Precondition>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, partition: &str, id: &str, doc: Document) -> &mut Self {
        self.ops.push(WriteOp::Set {
            partition: partition.to_string(),
            id: id.to_string(),
            doc,
        });
        self
    }

    pub fn update(&mut self, partition: &str, id: &str, fields: Document) -> &mut Self {
        self.ops.push(WriteOp::Update {
            partition: partition.to_string(),
            id: id.to_string(),
            fields,
        });
        self
    }

    pub fn delete(&mut self, partition: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            partition: partition.to_string(),
            id: id.to_string(),
        });
        self
    }

    /// Requires the stored document to be unchanged at commit time.
    pub fn expect(&mut self, partition: &str, id: &str, expected: Option<Document>) -> &mut Self {
        self.preconditions.push(Precondition {
            partition: partition.to_string(),
            id: id.to_string(),
            expected,
        });
        self
    }

    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch, yielding its writes in order.
    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    #[must_use]
    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Number of writes (preconditions excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Typed commit failures. Carried inside `anyhow::Error`; downcast to inspect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document {partition}/{id} changed since it was read")]
    Conflict { partition: String, id: String },
    #[error("no document to update at {partition}/{id}")]
    MissingDocument { partition: String, id: String },
}

/// Store-native query: pushed-down filters, multi-key ordering, offset, limit.
///
/// Unlike collection searches, a document lacking a filtered or ordered field
/// is simply excluded rather than failing the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeQuery {
    filters: Vec<Where>,
    order_by: Vec<OrderBy>,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl NativeQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: serde_json::Value,
    ) -> Self {
        self.filters.push(Where::new(field, operator, value));
        self
    }

    #[must_use]
    pub fn where_clause(mut self, predicate: Where) -> Self {
        self.filters.push(predicate);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn filters(&self) -> &[Where] {
        &self.filters
    }

    #[must_use]
    pub fn orderings(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Evaluates the query over `(id, document)` rows.
    #[must_use]
    pub fn apply(&self, rows: Vec<(String, Document)>) -> Vec<(String, Document)> {
        let mut rows: Vec<(String, Document)> = rows
            .into_iter()
            .filter(|(_, doc)| self.filters.iter().all(|f| f.matches_lenient(doc)))
            .filter(|(_, doc)| self.order_by.iter().all(|o| doc.contains_key(&o.field)))
            .collect();

        if !self.order_by.is_empty() {
            rows.sort_by(|(_, a), (_, b)| {
                self.order_by
                    .iter()
                    .map(|o| o.compare(&a[&o.field], &b[&o.field]))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let rows = rows.into_iter().skip(self.offset.unwrap_or(0));
        match self.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }
}

/// Partitioned document persistence.
///
/// Used as `Arc<dyn DocumentStore>`. Single-document writes default to
/// one-operation batches.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in the partition as `(id, document)`, ordered by id.
    async fn get_all(&self, partition: &str) -> anyhow::Result<Vec<(String, Document)>>;

    /// A single document, or `None` if absent.
    async fn get(&self, partition: &str, id: &str) -> anyhow::Result<Option<Document>>;

    /// Applies every write in `batch` atomically, or none of them.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] when a precondition no longer holds, and
    /// [`StoreError::MissingDocument`] when an update targets an absent id.
    async fn commit(&self, batch: WriteBatch) -> anyhow::Result<()>;

    /// Insert or replace a document.
    async fn set(&self, partition: &str, id: &str, doc: Document) -> anyhow::Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(partition, id, doc);
        self.commit(batch).await
    }

    /// Merge fields into an existing document.
    async fn update(&self, partition: &str, id: &str, fields: Document) -> anyhow::Result<()> {
        let mut batch = WriteBatch::new();
        batch.update(partition, id, fields);
        self.commit(batch).await
    }

    /// Remove a document.
    async fn delete(&self, partition: &str, id: &str) -> anyhow::Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(partition, id);
        self.commit(batch).await
    }

    /// Runs a native query against the partition.
    async fn query(
        &self,
        partition: &str,
        query: &NativeQuery,
    ) -> anyhow::Result<Vec<(String, Document)>> {
        Ok(query.apply(self.get_all(partition).await?))
    }
}
