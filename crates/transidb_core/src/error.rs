//! Error types for TransiDB core.

use crate::constraint::ConstraintViolation;
use crate::types::SessionId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in TransiDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Persistent store error.
    #[error("storage error: {0}")]
    Storage(#[from] transidb_storage::StorageError),

    /// The transient store is closed.
    #[error("transient store is closed")]
    StoreClosed,

    /// The calling thread already has another session bound.
    #[error("thread already has session {current} bound, cannot resume {requested}")]
    SessionAlreadyBound {
        /// The session bound to the thread.
        current: SessionId,
        /// The session that was to be resumed.
        requested: SessionId,
    },

    /// The session is already in the live set.
    #[error("{session} is already registered")]
    SessionAlreadyRegistered {
        /// The offending session.
        session: SessionId,
    },

    /// The session is not in the live set.
    #[error("{session} is not registered")]
    SessionNotRegistered {
        /// The offending session.
        session: SessionId,
    },

    /// The operation needs a session bound to the calling thread.
    #[error("no session is bound to the current thread")]
    NoThreadSession,

    /// The session was already committed or aborted.
    #[error("{session} is not active")]
    SessionNotActive {
        /// The offending session.
        session: SessionId,
    },

    /// A mutation was attempted through a read-only session.
    #[error("{session} is read-only")]
    ReadonlySession {
        /// The offending session.
        session: SessionId,
    },

    /// A required property has no value.
    #[error("required property {property} of {entity} is undefined")]
    RequiredPropertyUndefined {
        /// The entity owning the property.
        entity: String,
        /// The property name.
        property: String,
    },

    /// Flush validation failed.
    #[error("{} constraint violation(s), first: {}", .violations.len(), first_message(.violations))]
    ConstraintsViolated {
        /// All violations, in validation order.
        violations: Vec<ConstraintViolation>,
    },

    /// An on-delete policy refused the deletion.
    #[error("cannot delete {entity}: link {property} is restricted")]
    DeleteRestricted {
        /// The entity that was to be deleted.
        entity: String,
        /// The link whose policy refused.
        property: String,
    },

    /// The entity was removed.
    #[error("entity {entity} was removed")]
    EntityRemoved {
        /// The removed entity.
        entity: String,
    },

    /// A never-flushed entity of another session cannot be re-attached.
    #[error("entity {entity} belongs to {session} and has not been saved")]
    ForeignSessionEntity {
        /// The entity.
        entity: String,
        /// The session owning the entity.
        session: SessionId,
    },

    /// The entity type is not declared in the model.
    #[error("unknown entity type: {name}")]
    UnknownEntityType {
        /// The type name.
        name: String,
    },

    /// The entity has no persistent counterpart.
    #[error("cannot unwrap {entity} to a persistent entity")]
    CannotUnwrap {
        /// The entity.
        entity: String,
    },

    /// A constraint could not be built.
    #[error("invalid constraint: {message}")]
    InvalidConstraint {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

fn first_message(violations: &[ConstraintViolation]) -> &str {
    violations.first().map_or("", |v| v.message.as_str())
}

impl CoreError {
    /// Creates a required property undefined error.
    pub fn required_property_undefined(
        entity: impl ToString,
        property: impl Into<String>,
    ) -> Self {
        Self::RequiredPropertyUndefined {
            entity: entity.to_string(),
            property: property.into(),
        }
    }

    /// Creates an entity removed error.
    pub fn entity_removed(entity: impl ToString) -> Self {
        Self::EntityRemoved {
            entity: entity.to_string(),
        }
    }

    /// Creates an unknown entity type error.
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType { name: name.into() }
    }

    /// Creates an invalid constraint error.
    pub fn invalid_constraint(message: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
