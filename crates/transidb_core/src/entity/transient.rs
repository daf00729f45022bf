//! Transient entity handles.

use crate::types::{SessionId, TransientId};
use std::fmt;
use std::sync::{Arc, OnceLock};
use transidb_storage::PersistentEntityId;

/// Identity of an entity inside a session.
///
/// New entities are keyed by their transient id until their session flushes;
/// saved entities are keyed by their persistent id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    /// Not flushed yet.
    New(TransientId),
    /// Stored in the persistent store.
    Saved(PersistentEntityId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New(id) => write!(f, "{id}"),
            Self::Saved(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug)]
struct EntityInner {
    entity_type: String,
    session: SessionId,
    transient_id: TransientId,
    persistent: OnceLock<PersistentEntityId>,
}

/// A handle to an entity as seen by one session.
///
/// Handles are cheap to clone. A handle created for a new entity learns its
/// persistent id when the owning session flushes, and every clone observes
/// it.
#[derive(Clone)]
pub struct TransientEntity {
    inner: Arc<EntityInner>,
}

impl TransientEntity {
    pub(crate) fn new(entity_type: impl Into<String>, session: SessionId) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                entity_type: entity_type.into(),
                session,
                transient_id: TransientId::new(),
                persistent: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn saved(
        entity_type: impl Into<String>,
        session: SessionId,
        id: PersistentEntityId,
    ) -> Self {
        let persistent = OnceLock::new();
        let _ = persistent.set(id);
        Self {
            inner: Arc::new(EntityInner {
                entity_type: entity_type.into(),
                session,
                transient_id: TransientId::new(),
                persistent,
            }),
        }
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.inner.entity_type
    }

    /// Returns the session this handle belongs to.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.session
    }

    /// Returns the session-local identity.
    #[must_use]
    pub fn transient_id(&self) -> TransientId {
        self.inner.transient_id
    }

    /// Returns the persistent id, if the entity has been saved.
    #[must_use]
    pub fn persistent_id(&self) -> Option<PersistentEntityId> {
        self.inner.persistent.get().copied()
    }

    /// Returns `true` if the entity has not been flushed yet.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.inner.persistent.get().is_none()
    }

    /// Returns the current identity of the entity.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        match self.persistent_id() {
            Some(id) => EntityKey::Saved(id),
            None => EntityKey::New(self.inner.transient_id),
        }
    }

    pub(crate) fn assign_persistent_id(&self, id: PersistentEntityId) {
        let _ = self.inner.persistent.set(id);
    }
}

impl PartialEq for TransientEntity {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        match (self.persistent_id(), other.persistent_id()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.inner.transient_id == other.inner.transient_id,
            _ => false,
        }
    }
}

impl Eq for TransientEntity {}

impl fmt::Debug for TransientEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientEntity")
            .field("type", &self.inner.entity_type)
            .field("key", &self.key())
            .field("session", &self.inner.session)
            .finish()
    }
}

impl fmt::Display for TransientEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.inner.entity_type, self.key())
    }
}
