//! Schema-validated collection client.
//!
//! A [`Collection`] wraps one named partition of a
//! [`DocumentStore`](crate::storage::DocumentStore): it validates writes against its effective schema (caller fields plus the
//! `id`/`created_at`/`updated_at` triplet), caches whole-partition reads,
//! runs in-memory searches, traverses declared relations, and appends an
//! audit [`LogEntry`] for every mutating or search operation.
//!
//! Collections opened through a [`CollectionRegistry`] resolve relation
//! targets by partition name; standalone collections have no relation
//! targets.

pub mod batch;
mod cache;
pub mod context;
pub mod options;
pub mod relation;

use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use voyage_core::query::{exclude_fields, filter_documents, project_fields, sort_documents};
use voyage_core::{Document, OrderBy, Schema, Where, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};

pub use batch::BatchOperation;
pub use context::CollectionContext;
pub use options::{AdvancedSearch, HealReport, ReadOptions};
pub use relation::{Related, Relation, RelationKind};

use self::cache::CollectionCache;
use crate::error::{CollectionError, Result};
use crate::registry::CollectionRegistry;
use crate::storage::{self, LogEntry, NativeQuery, Transaction, WriteBatch};

/// Client for one partition.
pub struct Collection {
    name: String,
    schema: Schema,
    context: CollectionContext,
    cache: CollectionCache,
    relations: RwLock<Vec<(String, Relation)>>,
    registry: Weak<CollectionRegistry>,
}

impl Collection {
    /// Standalone client with no registry. Does not self-heal.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Schema, context: CollectionContext) -> Self {
        Self::attached(name, schema, context, Weak::new())
    }

    pub(crate) fn attached(
        name: impl Into<String>,
        schema: Schema,
        context: CollectionContext,
        registry: Weak<CollectionRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            schema: Schema::with_base_fields(schema),
            context,
            cache: CollectionCache::new(),
            relations: RwLock::new(Vec::new()),
            registry,
        }
    }

    /// Standalone client that self-heals when the config asks for it.
    ///
    /// # Errors
    ///
    /// Propagates store failures from the heal pass.
    pub async fn open(
        name: impl Into<String>,
        schema: Schema,
        context: CollectionContext,
    ) -> Result<Arc<Self>> {
        let collection = Arc::new(Self::new(name, schema, context));
        if collection.context.config.heal_on_open {
            collection.heal().await?;
        }
        Ok(collection)
    }

    /// Partition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective schema, base fields included.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn context(&self) -> &CollectionContext {
        &self.context
    }

    /// Whether the next read will be served from the cache.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.is_loaded()
    }

    /// Drops the cached snapshot.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Backfills defaults for declared fields missing from stored documents.
    ///
    /// Reads the store directly. When any document changed, the partition is
    /// rewritten in one batch (every existing document deleted, the healed
    /// set written back) and the healed set becomes the cache. A healed
    /// partition is left untouched.
    ///
    /// # Errors
    ///
    /// Propagates store failures; nothing is written when the scan fails.
    pub async fn heal(&self) -> Result<HealReport> {
        let generation = self.cache.generation();
        let rows = self.context.store.get_all(&self.name).await?;
        let scanned = rows.len();

        let mut healed = 0;
        let rows: Vec<(String, Document)> = rows
            .into_iter()
            .map(|(key, doc)| {
                let mut doc = with_id(&key, doc);
                if self.schema.backfill(&mut doc) {
                    healed += 1;
                }
                (key, doc)
            })
            .collect();

        if healed == 0 {
            tracing::debug!(collection = %self.name, scanned, "collection already healed");
            self.cache
                .populate(generation, rows.into_iter().map(|(_, doc)| doc).collect());
            return Ok(HealReport { scanned, healed });
        }

        let mut batch = WriteBatch::new();
        for (key, _) in &rows {
            batch.delete(&self.name, key);
        }
        for (key, doc) in &rows {
            batch.set(&self.name, key, doc.clone());
        }
        self.context.store.commit(batch).await?;
        self.cache
            .replace(rows.into_iter().map(|(_, doc)| doc).collect());

        tracing::info!(collection = %self.name, scanned, healed, "healed collection");
        Ok(HealReport { scanned, healed })
    }

    /// Creates a record with a fresh id and timestamps.
    ///
    /// Only declared fields are persisted; the returned record also echoes
    /// any undeclared fields the caller passed.
    ///
    /// # Errors
    ///
    /// [`CollectionError::Validation`] when the record does not satisfy the
    /// schema. Nothing is written in that case.
    pub async fn create(&self, data: Document) -> Result<Document> {
        let id = self.context.ids.generate();
        self.create_with_id(&id, data).await
    }

    async fn create_with_id(&self, id: &str, data: Document) -> Result<Document> {
        let now = self.context.clock.now();
        let (record, stored) = self.prepare_create(id, data, &now)?;
        self.context.store.set(&self.name, id, stored).await?;
        self.cache.invalidate();
        self.log(format!("Added data with ID: {id}")).await;
        Ok(record)
    }

    /// Creates every record in one atomic batch.
    ///
    /// All records share one timestamp and are validated before anything is
    /// written.
    ///
    /// # Errors
    ///
    /// The first [`CollectionError::Validation`] encountered, or a store
    /// failure from the commit.
    pub async fn create_many(&self, items: Vec<Document>) -> Result<Vec<Document>> {
        let now = self.context.clock.now();
        let mut batch = WriteBatch::new();
        let mut created = Vec::with_capacity(items.len());
        for data in items {
            let id = self.context.ids.generate();
            let (record, stored) = self.prepare_create(&id, data, &now)?;
            batch.set(&self.name, &id, stored);
            created.push(record);
        }

        self.context.store.commit(batch).await?;
        self.cache.invalidate();
        self.log(format!("Added {} data", created.len())).await;
        Ok(created)
    }

    /// Every record in the partition, served from cache when loaded.
    ///
    /// # Errors
    ///
    /// Propagates store failures on a cache miss.
    pub async fn read(&self) -> Result<Vec<Document>> {
        Ok(self.snapshot().await?.as_ref().clone())
    }

    /// Reads, applies offset then limit, then strips `options.fields`.
    ///
    /// # Errors
    ///
    /// Propagates store failures on a cache miss.
    pub async fn read_with_options_and_fields(
        &self,
        options: &ReadOptions,
    ) -> Result<Vec<Document>> {
        let page = options.options.apply(self.read().await?);
        Ok(exclude_fields(page, &options.fields))
    }

    /// Reads and keeps only the named fields of each record.
    ///
    /// # Errors
    ///
    /// Propagates store failures on a cache miss.
    pub async fn read_with_fields(&self, fields: &[String]) -> Result<Vec<Document>> {
        Ok(project_fields(&self.snapshot().await?, fields))
    }

    /// Applies a partial patch to an existing record.
    ///
    /// Every patch key must be declared. The merged record is validated once,
    /// and only the patch plus a refreshed `updated_at` is written.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NotFound`], [`CollectionError::UndeclaredField`] or
    /// [`CollectionError::Validation`], all before any write.
    pub async fn update(&self, id: &str, patch: Document) -> Result<()> {
        let existing = self.fetch_existing(id).await?;
        let now = self.context.clock.now();
        let updates = self.prepare_patch(id, existing, patch, &now)?;
        self.context.store.update(&self.name, id, updates).await?;
        self.cache.invalidate();
        self.log(format!("Updated data with ID: {id}")).await;
        Ok(())
    }

    /// Deletes one record without touching relations.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NotFound`] if the record is absent.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.fetch_existing(id).await?;
        self.context.store.delete(&self.name, id).await?;
        self.cache.invalidate();
        self.log(format!("Deleted data with ID: {id}")).await;
        Ok(())
    }

    /// Records matching a single predicate, in store order.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnsupportedOperator`] for an unknown operator
    /// spelling, raised before the store is read, and
    /// [`CollectionError::MissingField`] if any record lacks `field`.
    pub async fn search(&self, field: &str, operator: &str, value: Value) -> Result<Vec<Document>> {
        let predicate = Where::parse(field, operator, value)?;
        let docs = self.snapshot().await?;
        self.log("search").await;
        Ok(filter_documents(docs.iter().cloned(), &[predicate])?)
    }

    /// Records matching every predicate, sorted by `order_by` (default:
    /// `created_at` ascending).
    ///
    /// # Errors
    ///
    /// [`CollectionError::MissingField`] when a predicate field is absent
    /// from any record, or when two or more records match and one of them
    /// lacks the sort field.
    pub async fn search_wheres(
        &self,
        wheres: &[Where],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        let docs = self.snapshot().await?;
        self.log("search").await;
        let mut matched = filter_documents(docs.iter().cloned(), wheres)?;
        let default_order = OrderBy::default();
        sort_documents(&mut matched, order_by.unwrap_or(&default_order))?;
        Ok(matched)
    }

    /// [`search`](Self::search), then offset, limit, and field exclusion.
    ///
    /// # Errors
    ///
    /// Whatever the search fails with, after logging `advanced search error`.
    pub async fn advanced_search(&self, query: &AdvancedSearch) -> Result<Vec<Document>> {
        match self
            .search(&query.field, &query.operator, query.value.clone())
            .await
        {
            Ok(found) => {
                let page = query.options.apply(found);
                Ok(exclude_fields(page, &query.without_fields))
            }
            Err(err) => {
                self.log("advanced search error").await;
                Err(err)
            }
        }
    }

    /// Updates the record if it exists, otherwise creates it under `id`.
    ///
    /// An update returns `{id}` merged with the patch, not the stored record;
    /// a create returns what [`create`](Self::create) returns.
    ///
    /// # Errors
    ///
    /// Those of [`update`](Self::update) or [`create`](Self::create).
    pub async fn upsert(&self, id: &str, patch: Document) -> Result<Document> {
        if self.context.store.get(&self.name, id).await?.is_some() {
            self.update(id, patch.clone()).await?;
            let mut echoed = patch;
            echoed.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            Ok(echoed)
        } else {
            self.create_with_id(id, patch).await
        }
    }

    /// Runs a store-native query against this partition, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn native_query(&self, query: &NativeQuery) -> Result<Vec<Document>> {
        let rows = self.context.store.query(&self.name, query).await?;
        Ok(rows
            .into_iter()
            .map(|(key, doc)| with_id(&key, doc))
            .collect())
    }

    /// Runs an optimistic transaction against the underlying store.
    ///
    /// The handler may touch any partition and may run more than once. The
    /// cache is dropped after a successful commit.
    ///
    /// # Errors
    ///
    /// The handler's error or the final commit failure, as
    /// [`CollectionError::Store`].
    pub async fn run_transaction<T, F>(&self, handler: F) -> Result<T>
    where
        T: Send,
        F: for<'t> FnMut(&'t mut Transaction) -> BoxFuture<'t, anyhow::Result<T>> + Send,
    {
        let value = storage::run_transaction(
            &self.context.store,
            self.context.config.transaction_max_attempts,
            handler,
        )
        .await?;
        self.cache.invalidate();
        Ok(value)
    }

    async fn snapshot(&self) -> Result<Arc<Vec<Document>>> {
        if let Some(docs) = self.cache.snapshot() {
            return Ok(docs);
        }
        let generation = self.cache.generation();
        let docs = self.load_from_store().await?;
        tracing::debug!(collection = %self.name, count = docs.len(), "filled collection cache");
        Ok(self.cache.populate(generation, docs))
    }

    async fn load_from_store(&self) -> Result<Vec<Document>> {
        let rows = self.context.store.get_all(&self.name).await?;
        Ok(rows
            .into_iter()
            .map(|(key, doc)| with_id(&key, doc))
            .collect())
    }

    async fn fetch_existing(&self, id: &str) -> Result<Document> {
        self.context
            .store
            .get(&self.name, id)
            .await?
            .map(|doc| with_id(id, doc))
            .ok_or_else(|| CollectionError::not_found(&self.name, id))
    }

    /// Nulls `foreign_key` on a record, skipping validation.
    async fn detach(&self, id: &str, foreign_key: &str) -> Result<()> {
        let mut fields = Document::new();
        fields.insert(foreign_key.to_string(), Value::Null);
        fields.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(self.context.clock.now()),
        );
        self.context.store.update(&self.name, id, fields).await?;
        self.cache.invalidate();
        self.log(format!("Updated data with ID: {id}")).await;
        Ok(())
    }

    /// Stamps and validates a new record. Returns `(echoed, persisted)`.
    fn prepare_create(
        &self,
        id: &str,
        mut data: Document,
        now: &str,
    ) -> Result<(Document, Document)> {
        data.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        data.insert(CREATED_AT_FIELD.to_string(), Value::String(now.to_string()));
        data.insert(UPDATED_AT_FIELD.to_string(), Value::String(now.to_string()));
        self.schema.validate(&data)?;
        let stored = self.schema.retain_declared(&data);
        Ok((data, stored))
    }

    /// Checks a patch against the schema and the merged record. Returns the
    /// fields to write.
    fn prepare_patch(
        &self,
        id: &str,
        existing: Document,
        patch: Document,
        now: &str,
    ) -> Result<Document> {
        if let Some(field) = patch.keys().find(|key| !self.schema.contains(key)) {
            return Err(CollectionError::UndeclaredField {
                field: field.clone(),
            });
        }

        let mut updates = patch;
        updates.insert(UPDATED_AT_FIELD.to_string(), Value::String(now.to_string()));

        let mut merged = existing;
        merged.extend(updates.clone());
        merged.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        self.schema.validate(&merged)?;
        Ok(updates)
    }

    async fn log(&self, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: self.context.clock.now(),
            message: message.into(),
            collection: self.name.clone(),
        };
        if let Err(err) = self.context.log_sink.append(&entry).await {
            tracing::warn!(collection = %self.name, error = %err, "failed to write log entry");
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("fields", &self.schema.len())
            .field("relations", &self.relations.read().len())
            .finish_non_exhaustive()
    }
}

/// Fills in `id` from the storage key when the stored body lacks one.
fn with_id(key: &str, mut doc: Document) -> Document {
    doc.entry(ID_FIELD)
        .or_insert_with(|| Value::String(key.to_string()));
    doc
}
