use std::sync::Arc;

use voyage_core::{Clock, IdGenerator, SystemClock, UuidGenerator};

use crate::config::StoreConfig;
use crate::storage::{DocumentStore, LogSink};

/// Collaborators shared by every collection opened against one store.
#[derive(Clone)]
pub struct CollectionContext {
    pub store: Arc<dyn DocumentStore>,
    pub log_sink: Arc<dyn LogSink>,
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<StoreConfig>,
}

impl CollectionContext {
    /// Context with v4 UUIDs, the system clock, and default config.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            store,
            log_sink,
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
            config: Arc::new(StoreConfig::default()),
        }
    }

    #[must_use]
    pub fn with_log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = Arc::new(config);
        self
    }
}

impl std::fmt::Debug for CollectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
