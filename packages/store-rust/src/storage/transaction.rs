//! Optimistic read-modify-write transactions over a [`DocumentStore`].
//!
//! Reads through a [`Transaction`] record what was seen; writes are buffered
//! and committed as one [`WriteBatch`] guarded by those observations. A
//! conflicting commit re-runs the handler against fresh state.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use voyage_core::Document;

use crate::storage::document_store::{DocumentStore, StoreError, WriteBatch};

/// Handle passed to a transaction handler.
pub struct Transaction {
    store: Arc<dyn DocumentStore>,
    batch: WriteBatch,
    observed: HashSet<(String, String)>,
}

impl Transaction {
    fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            batch: WriteBatch::new(),
            observed: HashSet::new(),
        }
    }

    /// Reads a document and requires it to be unchanged at commit.
    ///
    /// Only the first read of a key is recorded; later reads see the store
    /// as it is now, not the transaction's own buffered writes.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn get(&mut self, partition: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let doc = self.store.get(partition, id).await?;
        if self.observed.insert((partition.to_string(), id.to_string())) {
            self.batch.expect(partition, id, doc.clone());
        }
        Ok(doc)
    }

    pub fn set(&mut self, partition: &str, id: &str, doc: Document) {
        self.batch.set(partition, id, doc);
    }

    pub fn update(&mut self, partition: &str, id: &str, fields: Document) {
        self.batch.update(partition, id, fields);
    }

    pub fn delete(&mut self, partition: &str, id: &str) {
        self.batch.delete(partition, id);
    }

    /// Number of buffered writes.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.batch.len()
    }
}

/// Runs `handler` inside a transaction, retrying on conflict.
///
/// The handler may run several times and must not have side effects outside
/// the [`Transaction`]. A handler error aborts without writing anything.
///
/// # Errors
///
/// Returns the handler's error, a non-conflict commit error, or the last
/// [`StoreError::Conflict`] once `max_attempts` (at least one) are used up.
pub async fn run_transaction<T, F>(
    store: &Arc<dyn DocumentStore>,
    max_attempts: u32,
    mut handler: F,
) -> anyhow::Result<T>
where
    T: Send,
    F: for<'t> FnMut(&'t mut Transaction) -> BoxFuture<'t, anyhow::Result<T>> + Send,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let mut tx = Transaction::new(Arc::clone(store));
        let value = handler(&mut tx).await?;

        match store.commit(tx.batch).await {
            Ok(()) => return Ok(value),
            Err(err) if attempt < max_attempts && is_conflict(&err) => {
                tracing::debug!(attempt, error = %err, "transaction conflict, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_conflict(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<StoreError>(), Some(StoreError::Conflict { .. }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;
    use voyage_core::types::into_document;

    use super::*;
    use crate::storage::engines::MemoryDocumentStore;

    fn doc(value: serde_json::Value) -> Document {
        into_document(value).unwrap()
    }

    async fn seeded() -> Arc<dyn DocumentStore> {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        store
            .set("package_schedules", "s1", with_seats(3))
            .await
            .unwrap();
        store
    }

    fn with_seats(seats: i64) -> Document {
        doc(json!({ "available_seats": seats }))
    }

    fn seats(doc: Option<&Document>) -> i64 {
        doc.and_then(|d| d["available_seats"].as_i64()).unwrap_or_default()
    }

    #[tokio::test]
    async fn commits_buffered_writes() {
        let store = seeded().await;
        let remaining = run_transaction(&store, 3, |tx| {
            Box::pin(async move {
                let current = tx.get("package_schedules", "s1").await?;
                let left = seats(current.as_ref()) - 1;
                assert_eq!(tx.pending_writes(), 0);
                tx.update("package_schedules", "s1", with_seats(left));
                assert_eq!(tx.pending_writes(), 1);
                Ok(left)
            })
        })
        .await
        .unwrap();

        assert_eq!(remaining, 2);
        let stored = store.get("package_schedules", "s1").await.unwrap();
        assert_eq!(seats(stored.as_ref()), 2);
    }

    #[tokio::test]
    async fn retries_after_a_concurrent_write() {
        let store = seeded().await;
        let attempts = Arc::new(AtomicU32::new(0));

        let outcome = run_transaction(&store, 3, |tx| {
            let store = Arc::clone(&store);
            let attempts = Arc::clone(&attempts);
            Box::pin(async move {
                let current = tx.get("package_schedules", "s1").await?;
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    store.set("package_schedules", "s1", with_seats(10)).await?;
                }
                let left = seats(current.as_ref()) - 1;
                tx.update("package_schedules", "s1", with_seats(left));
                Ok(left)
            })
        })
        .await
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(outcome, 9, "second attempt saw the concurrent write");
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let store = seeded().await;
        let attempts = Arc::new(AtomicU32::new(0));
        let err = run_transaction(&store, 2, |tx| {
            let store = Arc::clone(&store);
            let attempts = Arc::clone(&attempts);
            Box::pin(async move {
                tx.get("package_schedules", "s1").await?;
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 100;
                store.set("package_schedules", "s1", with_seats(n.into())).await?;
                tx.set("package_schedules", "s1", Document::new());
                Ok(())
            })
        })
        .await
        .unwrap_err();

        assert!(is_conflict(&err));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn handler_error_writes_nothing() {
        let store = seeded().await;
        let result: anyhow::Result<()> = run_transaction(&store, 3, |tx| {
            Box::pin(async move {
                tx.delete("package_schedules", "s1");
                anyhow::bail!("sold out")
            })
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "sold out");
        let kept = store.get("package_schedules", "s1").await.unwrap();
        assert!(kept.is_some());
    }
}
