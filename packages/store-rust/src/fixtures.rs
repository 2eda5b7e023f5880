//! JSON fixture loading.
//!
//! A fixture file maps partition names to arrays of records:
//! `{ "fleets": [{ "id": "f1", "name": "Bus 1" }], ... }`. Records are
//! written as-is, bypassing collections, so they can exercise self-heal.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use voyage_core::types::document_id;
use voyage_core::{Document, IdGenerator};

use crate::storage::{DocumentStore, WriteBatch};

/// Parsed fixture file, partitions in name order.
pub type Fixtures = BTreeMap<String, Vec<Document>>;

/// Parses fixture JSON.
///
/// # Errors
///
/// Fails when the input is not an object of arrays of objects.
pub fn parse_fixtures(raw: &str) -> anyhow::Result<Fixtures> {
    serde_json::from_str(raw).context("fixtures must map partition names to arrays of objects")
}

/// Writes every fixture record in one batch. Records without an `id` get one
/// from `ids`. Returns the number of records written.
///
/// # Errors
///
/// Propagates the store's commit failure.
pub async fn write_fixtures(
    store: &dyn DocumentStore,
    fixtures: &Fixtures,
    ids: &dyn IdGenerator,
) -> anyhow::Result<usize> {
    let mut batch = WriteBatch::new();
    for (partition, records) in fixtures {
        for record in records {
            let id = document_id(record).map_or_else(|| ids.generate(), str::to_string);
            batch.set(partition, &id, record.clone());
        }
    }
    let written = batch.len();
    store.commit(batch).await?;
    tracing::debug!(partitions = fixtures.len(), written, "loaded fixtures");
    Ok(written)
}

/// Reads, parses and writes a fixture file.
///
/// # Errors
///
/// I/O, parse, or store failures, with the path attached.
pub async fn load_fixtures(
    store: &dyn DocumentStore,
    path: &Path,
    ids: &dyn IdGenerator,
) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading fixtures from {}", path.display()))?;
    let fixtures = parse_fixtures(&raw).with_context(|| format!("parsing {}", path.display()))?;
    write_fixtures(store, &fixtures, ids).await
}
