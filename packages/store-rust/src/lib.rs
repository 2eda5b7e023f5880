//! Voyage Store: schema-validated document collections over a pluggable
//! document store, with relations, cascading deletes, and self-healing
//! migrations.

pub mod collection;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod models;
pub mod registry;
pub mod storage;

pub use collection::{
    AdvancedSearch, BatchOperation, Collection, CollectionContext, HealReport, ReadOptions, Related,
    Relation, RelationKind,
};
pub use config::StoreConfig;
pub use error::{CollectionError, Result};
pub use models::{register_travel_models, TravelModels};
pub use registry::CollectionRegistry;
pub use storage::{
    run_transaction, DocumentStore, LogEntry, LogSink, MemoryDocumentStore, NativeQuery, StoreError,
    Transaction, WriteBatch,
};
