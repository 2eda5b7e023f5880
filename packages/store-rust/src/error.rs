//! Error taxonomy for collection operations.

use voyage_core::{QueryError, ValidationError};

/// Errors returned by [`Collection`](crate::collection::Collection) operations.
///
/// Everything except [`CollectionError::Store`] is raised before any write
/// reaches the document store. Store failures propagate unmodified.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// A record does not satisfy the collection schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The operation targets an id with no stored record.
    #[error("data with ID: {id} not found in {collection}")]
    NotFound { collection: String, id: String },
    /// An update patch names a field the schema does not declare.
    #[error("field {field} is not defined in schema")]
    UndeclaredField { field: String },
    /// A filter or sort names a field absent from a scanned record.
    #[error("field {field} does not exist in data")]
    MissingField { field: String },
    /// The relation name was never registered on this collection.
    #[error("relation {relation} is not defined")]
    UnknownRelation { relation: String },
    /// The relation's target partition is not open in the registry.
    #[error("relation {relation} targets unregistered collection {target}")]
    UnresolvedTarget { relation: String, target: String },
    /// A filter uses an operator outside the supported set.
    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },
    /// The document store failed.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<QueryError> for CollectionError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::MissingField { field } => Self::MissingField { field },
            QueryError::UnsupportedOperator { operator } => Self::UnsupportedOperator { operator },
        }
    }
}

impl CollectionError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Result alias for collection operations.
pub type Result<T, E = CollectionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_errors_map_onto_collection_errors() {
        let err: CollectionError = QueryError::UnsupportedOperator {
            operator: "~=".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "unsupported operator: ~=");

        let err: CollectionError = QueryError::MissingField {
            field: "seats".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "field seats does not exist in data");
    }

    #[test]
    fn validation_errors_stay_transparent() {
        let err: CollectionError = ValidationError::MissingField {
            field: "email".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "missing required field: email");
    }
}
