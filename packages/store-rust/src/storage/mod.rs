//! Persistence layer beneath the collection clients.
//!
//! - [`DocumentStore`]: partitioned JSON document persistence with atomic
//!   [`WriteBatch`] commits and a store-native [`NativeQuery`]
//! - [`engines`]: concrete stores ([`MemoryDocumentStore`])
//! - [`run_transaction`]: optimistic read-modify-write with retry
//! - [`LogSink`]: audit trail destinations, with [`CompositeLogSink`] for
//!   fan-out

pub mod document_store;
pub mod engines;
pub mod log_sink;
pub mod transaction;

pub use document_store::*;
pub use engines::{MemoryDocumentStore, StatsSnapshot, StoreStats};
pub use log_sink::*;
pub use transaction::{run_transaction, Transaction};
