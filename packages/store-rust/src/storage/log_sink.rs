//! Audit log sinks.
//!
//! Every mutating and search operation of a collection appends a
//! [`LogEntry`]. Append failures are the caller's to swallow; sinks just
//! report them.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use voyage_core::types::into_document;
use voyage_core::IdGenerator;

use crate::storage::document_store::DocumentStore;

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    pub collection: String,
}

/// Destination for [`LogEntry`] records.
///
/// Used as `Arc<dyn LogSink>`.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Appends one entry.
    async fn append(&self, entry: &LogEntry) -> anyhow::Result<()>;
}

/// Discards every entry.
pub struct NullLogSink;

#[async_trait]
impl LogSink for NullLogSink {
    async fn append(&self, _entry: &LogEntry) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emits each entry as a `tracing` event at INFO.
pub struct TracingLogSink;

#[async_trait]
impl LogSink for TracingLogSink {
    async fn append(&self, entry: &LogEntry) -> anyhow::Result<()> {
        tracing::info!(
            collection = %entry.collection,
            timestamp = %entry.timestamp,
            "{}",
            entry.message
        );
        Ok(())
    }
}

/// Keeps entries in memory for inspection.
#[derive(Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry appended so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Messages only, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn append(&self, entry: &LogEntry) -> anyhow::Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Persists entries as documents in a dedicated store partition.
pub struct StoreLogSink {
    store: Arc<dyn DocumentStore>,
    partition: String,
    ids: Arc<dyn IdGenerator>,
}

impl StoreLogSink {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        partition: impl Into<String>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            partition: partition.into(),
            ids,
        }
    }
}

#[async_trait]
impl LogSink for StoreLogSink {
    async fn append(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let doc = into_document(serde_json::to_value(entry)?)
            .ok_or_else(|| anyhow::anyhow!("log entry did not serialize to an object"))?;
        self.store
            .set(&self.partition, &self.ids.generate(), doc)
            .await
    }
}

/// Fans out to multiple sinks.
///
/// Every sink receives the entry even if an earlier one fails; the first
/// failure is returned.
#[derive(Default)]
pub struct CompositeLogSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl CompositeLogSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    pub fn add(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl LogSink for CompositeLogSink {
    async fn append(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.append(entry).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use voyage_core::SequentialIds;

    use super::*;
    use crate::storage::engines::MemoryDocumentStore;

    struct FailingSink;

    #[async_trait]
    impl LogSink for FailingSink {
        async fn append(&self, _entry: &LogEntry) -> anyhow::Result<()> {
            anyhow::bail!("sink offline")
        }
    }

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            message: message.to_string(),
            collection: "bookings".to_string(),
        }
    }

    #[tokio::test]
    async fn memory_sink_keeps_order() {
        let sink = MemoryLogSink::new();
        sink.append(&entry("first")).await.unwrap();
        sink.append(&entry("second")).await.unwrap();
        assert_eq!(sink.messages(), ["first", "second"]);
        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn store_sink_writes_to_its_partition() {
        let store = Arc::new(MemoryDocumentStore::new());
        let sink = StoreLogSink::new(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            "logs",
            Arc::new(SequentialIds::new("log")),
        );
        sink.append(&entry("Added data with ID: b1")).await.unwrap();

        let stored = store.get("logs", "log-0001").await.unwrap().unwrap();
        assert_eq!(stored["message"], "Added data with ID: b1");
        assert_eq!(stored["collection"], "bookings");
    }

    #[tokio::test]
    async fn composite_delivers_to_all_and_reports_first_failure() {
        let memory = Arc::new(MemoryLogSink::new());
        let sink = CompositeLogSink::new(vec![
            Arc::new(FailingSink),
            Arc::clone(&memory) as Arc<dyn LogSink>,
        ]);

        let err = sink.append(&entry("search")).await.unwrap_err();
        assert_eq!(err.to_string(), "sink offline");
        assert_eq!(memory.messages(), ["search"]);
    }

    #[tokio::test]
    async fn composite_built_incrementally() {
        let first = Arc::new(MemoryLogSink::new());
        let second = Arc::new(MemoryLogSink::new());
        let mut sink = CompositeLogSink::default();
        sink.append(&entry("nobody listening")).await.unwrap();

        sink.add(Arc::clone(&first) as Arc<dyn LogSink>);
        sink.add(Arc::clone(&second) as Arc<dyn LogSink>);
        sink.append(&entry("read")).await.unwrap();

        assert_eq!(first.messages(), ["read"]);
        assert_eq!(second.messages(), ["read"]);
    }

    #[tokio::test]
    async fn null_and_tracing_sinks_accept_everything() {
        NullLogSink.append(&entry("x")).await.unwrap();
        TracingLogSink.append(&entry("x")).await.unwrap();
    }
}
