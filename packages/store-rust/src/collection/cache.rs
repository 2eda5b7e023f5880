//! Whole-collection read cache.
//!
//! The cache is either [`CacheState::Unloaded`] or a complete snapshot of
//! the partition. Every write resets it and bumps the generation; a fill
//! started under an older generation is dropped instead of installed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use voyage_core::Document;

#[derive(Debug, Clone, Default)]
enum CacheState {
    #[default]
    Unloaded,
    Loaded(Arc<Vec<Document>>),
}

#[derive(Debug, Default)]
pub(crate) struct CollectionCache {
    state: RwLock<CacheState>,
    generation: AtomicU64,
}

impl CollectionCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The loaded snapshot, if any.
    pub(crate) fn snapshot(&self) -> Option<Arc<Vec<Document>>> {
        match &*self.state.read() {
            CacheState::Loaded(docs) => Some(Arc::clone(docs)),
            CacheState::Unloaded => None,
        }
    }

    /// Generation to pass to [`populate`](Self::populate), read before the
    /// store is scanned.
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Installs `docs` unless a write happened since `generation` was read.
    /// Returns the snapshot either way.
    pub(crate) fn populate(&self, generation: u64, docs: Vec<Document>) -> Arc<Vec<Document>> {
        let docs = Arc::new(docs);
        let mut state = self.state.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *state = CacheState::Loaded(Arc::clone(&docs));
        }
        docs
    }

    /// Installs `docs` unconditionally, as after a write that produced them.
    pub(crate) fn replace(&self, docs: Vec<Document>) {
        let mut state = self.state.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *state = CacheState::Loaded(Arc::new(docs));
    }

    pub(crate) fn invalidate(&self) {
        let mut state = self.state.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *state = CacheState::Unloaded;
    }

    pub(crate) fn is_loaded(&self) -> bool {
        matches!(*self.state.read(), CacheState::Loaded(_))
    }
}
