//! `voyage-seed`: load travel fixtures into an in-memory store, open the
//! travel models (self-healing them), run cascading deletes, and print
//! per-partition counts.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use voyage_core::{IdGenerator, UuidGenerator};
use voyage_store::fixtures::load_fixtures;
use voyage_store::storage::{CompositeLogSink, StoreLogSink, TracingLogSink};
use voyage_store::{
    register_travel_models, CollectionContext, CollectionRegistry, DocumentStore,
    MemoryDocumentStore, StoreConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// A `partition:id` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordRef {
    partition: String,
    id: String,
}

impl FromStr for RecordRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((partition, id)) if !partition.is_empty() && !id.is_empty() => Ok(Self {
                partition: partition.to_string(),
                id: id.to_string(),
            }),
            _ => Err(format!("expected partition:id, got {s:?}")),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "voyage-seed", version, about)]
struct Args {
    /// JSON file mapping partition names to arrays of records.
    #[arg(long, env = "VOYAGE_FIXTURES")]
    fixtures: Option<PathBuf>,

    /// Cascade-delete `partition:id` after loading. Repeatable.
    #[arg(long = "cascade-delete", value_name = "PARTITION:ID")]
    cascade_delete: Vec<RecordRef>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "VOYAGE_LOG_FORMAT")]
    log_format: LogFormat,

    /// Skip self-heal when opening collections.
    #[arg(long, env = "VOYAGE_SKIP_HEAL")]
    skip_heal: bool,

    /// Write batches without schema validation.
    #[arg(long, env = "VOYAGE_UNCHECKED_BATCH_WRITES")]
    unchecked_batch_writes: bool,

    #[arg(long, default_value_t = 5, env = "VOYAGE_TRANSACTION_ATTEMPTS")]
    transaction_attempts: u32,

    /// Partition receiving audit log entries.
    #[arg(long, default_value = "logs", env = "VOYAGE_LOG_PARTITION")]
    log_partition: String,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            validate_batch_writes: !self.unchecked_batch_writes,
            transaction_max_attempts: self.transaction_attempts,
            heal_on_open: !self.skip_heal,
            log_partition: self.log_partition.clone(),
        }
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;
    let config = args.store_config();

    let store = Arc::new(MemoryDocumentStore::new());
    let ids: Arc<dyn IdGenerator> = Arc::new(UuidGenerator);
    if let Some(path) = &args.fixtures {
        let written = load_fixtures(store.as_ref(), path, ids.as_ref()).await?;
        tracing::info!(path = %path.display(), written, "fixtures loaded");
    }

    let mut log_sink = CompositeLogSink::default();
    log_sink.add(Arc::new(TracingLogSink));
    log_sink.add(Arc::new(StoreLogSink::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        config.log_partition.clone(),
        Arc::clone(&ids),
    )));
    let log_partition = config.log_partition.clone();
    let context = CollectionContext::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::new(log_sink),
    )
    .with_ids(ids)
    .with_config(config);
    let registry = CollectionRegistry::new(context);
    let models = register_travel_models(&registry).await?;

    for target in &args.cascade_delete {
        let collection = registry
            .get(&target.partition)
            .ok_or_else(|| anyhow::anyhow!("unknown partition {}", target.partition))?;
        collection.delete_with_relation(&target.id).await?;
        tracing::info!(partition = %target.partition, id = %target.id, "cascade delete finished");
    }

    for collection in models.all() {
        println!("{}: {}", collection.name(), collection.read().await?.len());
    }
    println!("{log_partition}: {}", store.partition_len(&log_partition));
    Ok(())
}
