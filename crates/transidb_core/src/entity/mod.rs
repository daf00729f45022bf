//! Entity handles.

mod transient;

pub use transient::{EntityKey, TransientEntity};

use crate::error::{CoreError, CoreResult};
use transidb_storage::PersistentEntityId;

/// Any entity reference accepted by the store's refactorings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyEntity {
    /// A session-bound entity handle.
    Transient(TransientEntity),
    /// A raw persistent entity.
    Persistent(PersistentEntityId),
}

impl AnyEntity {
    /// Returns the persistent entity this reference stands for.
    ///
    /// A persistent id is its own unwrap target. A transient entity unwraps
    /// to its saved counterpart.
    ///
    /// # Errors
    ///
    /// Returns `CannotUnwrap` for a transient entity that has never been
    /// flushed.
    pub fn unwrap_persistent(&self) -> CoreResult<PersistentEntityId> {
        match self {
            Self::Persistent(id) => Ok(*id),
            Self::Transient(entity) => entity.persistent_id().ok_or_else(|| CoreError::CannotUnwrap {
                entity: entity.to_string(),
            }),
        }
    }
}

impl From<TransientEntity> for AnyEntity {
    fn from(entity: TransientEntity) -> Self {
        Self::Transient(entity)
    }
}

impl From<&TransientEntity> for AnyEntity {
    fn from(entity: &TransientEntity) -> Self {
        Self::Transient(entity.clone())
    }
}

impl From<PersistentEntityId> for AnyEntity {
    fn from(id: PersistentEntityId) -> Self {
        Self::Persistent(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    #[test]
    fn persistent_unwraps_to_itself() {
        let id = PersistentEntityId::new(1, 1);
        assert_eq!(AnyEntity::from(id).unwrap_persistent().unwrap(), id);
    }

    #[test]
    fn saved_transient_unwraps() {
        let id = PersistentEntityId::new(1, 4);
        let entity = TransientEntity::saved("User", SessionId::new(1), id);
        assert_eq!(AnyEntity::from(&entity).unwrap_persistent().unwrap(), id);
    }

    #[test]
    fn new_transient_cannot_unwrap() {
        let entity = TransientEntity::new("User", SessionId::new(1));
        let result = AnyEntity::from(entity).unwrap_persistent();
        assert!(matches!(result, Err(CoreError::CannotUnwrap { .. })));
    }
}
