//! Error types for persistent store operations.

use crate::types::PersistentEntityId;
use std::io;
use thiserror::Error;

/// Result type for persistent store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the persistent store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The entity type is not known to the store.
    #[error("entity type not found: {name}")]
    EntityTypeNotFound {
        /// The requested type name.
        name: String,
    },

    /// An entity type with this name already exists.
    #[error("entity type already exists: {name}")]
    EntityTypeExists {
        /// The conflicting type name.
        name: String,
    },

    /// The entity does not exist.
    #[error("entity not found: {id}")]
    EntityNotFound {
        /// The missing entity.
        id: PersistentEntityId,
    },

    /// The store is closed.
    #[error("store is closed")]
    Closed,

    /// The store contents are inconsistent.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Creates an entity type not found error.
    pub fn entity_type_not_found(name: impl Into<String>) -> Self {
        Self::EntityTypeNotFound { name: name.into() }
    }

    /// Creates an entity type exists error.
    pub fn entity_type_exists(name: impl Into<String>) -> Self {
        Self::EntityTypeExists { name: name.into() }
    }
}
