//! Concrete [`DocumentStore`](super::DocumentStore) implementations.

pub mod memory;

pub use memory::{MemoryDocumentStore, StatsSnapshot, StoreStats};
