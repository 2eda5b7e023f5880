use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use voyage_core::Schema;

use crate::collection::{Collection, CollectionContext};
use crate::error::Result;

/// Owns every open [`Collection`] keyed by partition name.
///
/// Relation descriptors name their target partition and are resolved here at
/// traversal time, so collections can be opened in any order and may refer to
/// each other cyclically. Collections hold only a weak back-reference; the
/// registry must outlive any relation traversal.
#[derive(Debug)]
pub struct CollectionRegistry {
    context: CollectionContext,
    collections: DashMap<String, Arc<Collection>>,
    /// Open order for deterministic listing.
    open_order: RwLock<Vec<String>>,
}

impl CollectionRegistry {
    /// Creates an empty registry whose collections share `context`.
    #[must_use]
    pub fn new(context: CollectionContext) -> Arc<Self> {
        Arc::new(Self {
            context,
            collections: DashMap::new(),
            open_order: RwLock::new(Vec::new()),
        })
    }

    /// Opens a collection, self-healing it first when `heal_on_open` is set.
    ///
    /// Opening a name again replaces the previous client, including its
    /// relations.
    ///
    /// # Errors
    ///
    /// Propagates store failures from the heal pass; the collection is not
    /// registered in that case.
    pub async fn open(self: &Arc<Self>, name: &str, schema: Schema) -> Result<Arc<Collection>> {
        let collection = Arc::new(Collection::attached(
            name,
            schema,
            self.context.clone(),
            Arc::downgrade(self),
        ));
        if self.context.config.heal_on_open {
            collection.heal().await?;
        }

        if self
            .collections
            .insert(name.to_string(), Arc::clone(&collection))
            .is_none()
        {
            self.open_order.write().push(name.to_string());
        }
        Ok(collection)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Partition names in the order they were first opened.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.open_order.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    #[must_use]
    pub fn context(&self) -> &CollectionContext {
        &self.context
    }
}
