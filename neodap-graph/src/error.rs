//! Error types for the entity store

use crate::entity::EntityId;
use thiserror::Error;

/// Store and view errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Mutation attempted through a read-only view
    #[error("views are read-only; mutate the store instead")]
    ReadOnlyView,

    /// The referenced entity is not in the store
    #[error("entity {0} not found")]
    UnknownEntity(EntityId),

    /// Another live entity already owns this URI
    #[error("an entity with uri {0} already exists")]
    DuplicateUri(String),

    /// The entity was disposed before it was added
    #[error("{uri} has been disposed")]
    Disposed { uri: String },
}

/// Result type using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;
