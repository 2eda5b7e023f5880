//! In-memory [`DocumentStore`] implementation.
//!
//! Partitions are ordered maps behind a single [`RwLock`], so a
//! [`WriteBatch`] is validated and applied under one write guard and is
//! atomic with respect to every reader.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use voyage_core::Document;

use crate::storage::document_store::{DocumentStore, StoreError, WriteBatch, WriteOp};

/// Operation counters, used by tests to observe caching and write behavior.
#[derive(Debug, Default)]
pub struct StoreStats {
    full_scans: AtomicU64,
    point_reads: AtomicU64,
    commits: AtomicU64,
}

/// Point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Calls to `get_all` (including those behind `query`).
    pub full_scans: u64,
    /// Calls to `get`.
    pub point_reads: u64,
    /// Successful commits, one per batch or single-document write.
    pub commits: u64,
}

impl StoreStats {
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            full_scans: self.full_scans.load(Ordering::Relaxed),
            point_reads: self.point_reads.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
        }
    }
}

/// Ordered in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    partitions: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    stats: StoreStats,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current operation counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of documents in a partition (not counted as a read).
    #[must_use]
    pub fn partition_len(&self, partition: &str) -> usize {
        self.partitions.read().get(partition).map_or(0, BTreeMap::len)
    }

    /// Names of partitions holding at least one document.
    #[must_use]
    pub fn partition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .partitions
            .read()
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Checks preconditions and update targets against the current state
    /// overlaid with the batch's own earlier writes.
    fn check(
        partitions: &HashMap<String, BTreeMap<String, Document>>,
        batch: &WriteBatch,
    ) -> Result<(), StoreError> {
        let stored = |partition: &str, id: &str| partitions.get(partition).and_then(|p| p.get(id));

        for pre in batch.preconditions() {
            if stored(&pre.partition, &pre.id) != pre.expected.as_ref() {
                return Err(StoreError::Conflict {
                    partition: pre.partition.clone(),
                    id: pre.id.clone(),
                });
            }
        }

        let mut overlay: HashMap<(&str, &str), bool> = HashMap::new();
        for op in batch.ops() {
            match op {
                WriteOp::Set { partition, id, .. } => {
                    overlay.insert((partition, id), true);
                }
                WriteOp::Delete { partition, id } => {
                    overlay.insert((partition, id), false);
                }
                WriteOp::Update { partition, id, .. } => {
                    let exists = overlay
                        .get(&(partition.as_str(), id.as_str()))
                        .copied()
                        .unwrap_or_else(|| stored(partition, id).is_some());
                    if !exists {
                        return Err(StoreError::MissingDocument {
                            partition: partition.clone(),
                            id: id.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_all(&self, partition: &str) -> anyhow::Result<Vec<(String, Document)>> {
        self.stats.full_scans.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .partitions
            .read()
            .get(partition)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, partition: &str, id: &str) -> anyhow::Result<Option<Document>> {
        self.stats.point_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .partitions
            .read()
            .get(partition)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> anyhow::Result<()> {
        let mut partitions = self.partitions.write();
        Self::check(&partitions, &batch)?;

        for op in batch.into_ops() {
            match op {
                WriteOp::Set { partition, id, doc } => {
                    partitions.entry(partition).or_default().insert(id, doc);
                }
                WriteOp::Update {
                    partition,
                    id,
                    fields,
                } => {
                    if let Some(doc) = partitions.get_mut(&partition).and_then(|p| p.get_mut(&id)) {
                        doc.extend(fields);
                    }
                }
                WriteOp::Delete { partition, id } => {
                    if let Some(docs) = partitions.get_mut(&partition) {
                        docs.remove(&id);
                    }
                }
            }
        }
        drop(partitions);

        self.stats.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
