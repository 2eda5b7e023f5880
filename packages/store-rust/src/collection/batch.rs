//! Mixed create/update/delete batches committed atomically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use voyage_core::{Document, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};

use super::Collection;
use crate::error::Result;
use crate::storage::WriteBatch;

/// One entry of a [`Collection::batch_write`] call.
///
/// Deserializes from `{ "operation": "create" | "update" | "delete", "id"?, "data"? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum BatchOperation {
    Create {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        data: Document,
    },
    Update {
        id: String,
        data: Document,
    },
    Delete {
        id: String,
    },
}

impl BatchOperation {
    #[must_use]
    pub fn create(data: Document) -> Self {
        Self::Create { id: None, data }
    }

    #[must_use]
    pub fn create_with_id(id: impl Into<String>, data: Document) -> Self {
        Self::Create {
            id: Some(id.into()),
            data,
        }
    }

    #[must_use]
    pub fn update(id: impl Into<String>, data: Document) -> Self {
        Self::Update {
            id: id.into(),
            data,
        }
    }

    #[must_use]
    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete { id: id.into() }
    }
}

impl Collection {
    /// Commits every operation as one atomic batch and returns how many
    /// were written.
    ///
    /// With `validate_batch_writes` on (the default), creates are stamped
    /// and validated like [`create`](Self::create) (honoring a supplied id)
    /// and updates follow the [`update`](Self::update) rules against the
    /// stored record. With it off, creates are written as
    /// `{id, created_at, updated_at}` overlaid with the caller's data and
    /// updates as the data plus `updated_at`, unvalidated.
    ///
    /// # Errors
    ///
    /// Any validation, schema, or not-found error (validated mode) before
    /// the commit, or the store's commit failure. Nothing is written on error.
    pub async fn batch_write(&self, operations: Vec<BatchOperation>) -> Result<usize> {
        let now = self.context.clock.now();
        let validate = self.context.config.validate_batch_writes;
        let mut batch = WriteBatch::new();

        for operation in operations {
            match operation {
                BatchOperation::Delete { id } => {
                    batch.delete(&self.name, &id);
                }
                BatchOperation::Update { id, data } => {
                    let updates = if validate {
                        let existing = self.fetch_existing(&id).await?;
                        self.prepare_patch(&id, existing, data, &now)?
                    } else {
                        let mut updates = data;
                        updates.insert(UPDATED_AT_FIELD.to_string(), Value::String(now.clone()));
                        updates
                    };
                    batch.update(&self.name, &id, updates);
                }
                BatchOperation::Create { id, data } => {
                    let id = id.unwrap_or_else(|| self.context.ids.generate());
                    let record = if validate {
                        self.prepare_create(&id, data, &now)?.1
                    } else {
                        let mut record = Document::new();
                        record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                        record.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
                        record.insert(UPDATED_AT_FIELD.to_string(), Value::String(now.clone()));
                        record.extend(data);
                        record
                    };
                    batch.set(&self.name, &id, record);
                }
            }
        }

        let count = batch.len();
        self.context.store.commit(batch).await?;
        self.cache.invalidate();
        self.log(format!("Batch wrote {count} operations")).await;
        Ok(count)
    }
}
