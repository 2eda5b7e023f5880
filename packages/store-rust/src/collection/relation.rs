//! Relation descriptors, traversal, and cascading delete.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use voyage_core::types::{array_contains, document_id, values_equal};
use voyage_core::Document;

use super::Collection;
use crate::error::{CollectionError, Result};

/// Cardinality of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    /// First target whose foreign key equals the local key.
    OneToOne,
    /// Every target whose foreign key equals the local key.
    OneToMany,
    /// Every target whose foreign-key array contains the local key.
    ManyToMany,
}

/// Link from an owning collection to a target partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Target partition name, resolved through the registry.
    pub target: String,
    #[serde(rename = "type")]
    pub kind: RelationKind,
    /// Field on target records.
    pub foreign_key: String,
    /// Field on the owning record.
    pub local_key: String,
    /// One-to-many only: null the foreign key instead of deleting targets.
    #[serde(default)]
    pub on_delete_null: bool,
}

impl Relation {
    /// Relation keyed on the owner's `id`.
    #[must_use]
    pub fn new(
        kind: RelationKind,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            kind,
            foreign_key: foreign_key.into(),
            local_key: voyage_core::ID_FIELD.to_string(),
            on_delete_null: false,
        }
    }

    #[must_use]
    pub fn one_to_one(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::OneToOne, target, foreign_key)
    }

    #[must_use]
    pub fn one_to_many(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::OneToMany, target, foreign_key)
    }

    #[must_use]
    pub fn many_to_many(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::ManyToMany, target, foreign_key)
    }

    #[must_use]
    pub fn with_local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = local_key.into();
        self
    }

    #[must_use]
    pub fn nulling_on_delete(mut self) -> Self {
        self.on_delete_null = true;
        self
    }

    /// Whether `candidate` (a target record) is related to `owner`.
    ///
    /// Nothing matches when either key is missing. Many-to-many requires
    /// the candidate's foreign key to be an array.
    #[must_use]
    pub fn matches(&self, owner: &Document, candidate: &Document) -> bool {
        let (Some(local), Some(foreign)) = (
            owner.get(&self.local_key),
            candidate.get(&self.foreign_key),
        ) else {
            return false;
        };
        match self.kind {
            RelationKind::OneToOne | RelationKind::OneToMany => values_equal(foreign, local),
            RelationKind::ManyToMany => array_contains(foreign, local),
        }
    }
}

/// Result of [`Collection::get_related`].
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Document>),
    Many(Vec<Document>),
}

impl Related {
    /// Flattens either shape into a list.
    #[must_use]
    pub fn into_vec(self) -> Vec<Document> {
        match self {
            Self::One(doc) => doc.into_iter().collect(),
            Self::Many(docs) => docs,
        }
    }
}

type Visited = HashSet<(String, String)>;

impl Collection {
    /// Declares (or replaces, keeping its position) a named relation.
    pub fn set_relation(&self, name: impl Into<String>, relation: Relation) {
        let name = name.into();
        let mut relations = self.relations.write();
        match relations.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = relation,
            None => relations.push((name, relation)),
        }
    }

    /// Declared relations in registration order.
    #[must_use]
    pub fn relations(&self) -> Vec<(String, Relation)> {
        self.relations.read().clone()
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<Relation> {
        self.relations
            .read()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, relation)| relation.clone())
    }

    /// Target records related to the record `id` through `relation_name`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownRelation`], [`CollectionError::NotFound`]
    /// for a missing base record, or [`CollectionError::UnresolvedTarget`].
    pub async fn get_related(&self, id: &str, relation_name: &str) -> Result<Related> {
        let relation = self
            .relation(relation_name)
            .ok_or_else(|| CollectionError::UnknownRelation {
                relation: relation_name.to_string(),
            })?;
        let owner = self.fetch_existing(id).await?;
        let target = self.resolve(relation_name, &relation)?;

        let candidates = target.snapshot().await?;
        let mut matched = candidates
            .iter()
            .filter(|candidate| relation.matches(&owner, candidate))
            .cloned();
        Ok(match relation.kind {
            RelationKind::OneToOne => Related::One(matched.next()),
            RelationKind::OneToMany | RelationKind::ManyToMany => Related::Many(matched.collect()),
        })
    }

    /// Deletes the record `id` after cascading through every relation in
    /// registration order, depth first.
    ///
    /// One-to-one and many-to-many targets are cascade-deleted. One-to-many
    /// targets are cascade-deleted, or have their foreign key set to null
    /// when the relation says so. A record already visited during this call
    /// is skipped, so cyclic relation graphs terminate.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NotFound`] if the record is absent, and any error
    /// from resolving a relation target or deleting a dependent. Dependents
    /// processed before a failure stay deleted.
    pub async fn delete_with_relation(&self, id: &str) -> Result<()> {
        let mut visited = Visited::new();
        self.cascade_delete(id.to_string(), &mut visited).await
    }

    fn cascade_delete<'a>(
        &'a self,
        id: String,
        visited: &'a mut Visited,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !visited.insert((self.name.clone(), id.clone())) {
                tracing::debug!(collection = %self.name, id = %id, "record already visited");
                return Ok(());
            }

            let owner = self.fetch_existing(&id).await?;
            for (name, relation) in self.relations() {
                let target = self.resolve(&name, &relation)?;
                let related: Vec<String> = target
                    .snapshot()
                    .await?
                    .iter()
                    .filter(|candidate| relation.matches(&owner, candidate))
                    .filter_map(|candidate| document_id(candidate).map(str::to_string))
                    .collect();

                match relation.kind {
                    RelationKind::OneToOne => {
                        if let Some(first) = related.into_iter().next() {
                            target.cascade_delete(first, visited).await?;
                        }
                    }
                    RelationKind::OneToMany if relation.on_delete_null => {
                        for dependent in related {
                            target.detach(&dependent, &relation.foreign_key).await?;
                        }
                    }
                    RelationKind::OneToMany | RelationKind::ManyToMany => {
                        for dependent in related {
                            target.cascade_delete(dependent, visited).await?;
                        }
                    }
                }
            }

            self.context.store.delete(&self.name, &id).await?;
            self.cache.invalidate();
            self.log(format!("Deleted data with ID: {id} with relations")).await;
            Ok(())
        })
    }

    fn resolve(&self, relation_name: &str, relation: &Relation) -> Result<Arc<Collection>> {
        self.registry
            .upgrade()
            .and_then(|registry| registry.get(&relation.target))
            .ok_or_else(|| CollectionError::UnresolvedTarget {
                relation: relation_name.to_string(),
                target: relation.target.clone(),
            })
    }
}
