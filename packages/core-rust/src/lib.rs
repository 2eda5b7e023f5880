//! Voyage Core: document schemas, validation, and the in-memory query engine.

pub mod clock;
pub mod ids;
pub mod query;
pub mod schema;
pub mod types;

pub use clock::{Clock, SequenceClock, SystemClock};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use query::{Direction, Operator, OrderBy, Pagination, QueryError, Where};
pub use schema::{FieldKind, Schema, SchemaNode, ValidationError};
pub use types::{Document, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};

