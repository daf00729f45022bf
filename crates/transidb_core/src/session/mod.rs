//! Transient sessions.
//!
//! A session is the unit of work of one worker thread. It buffers entity
//! changes in memory, serves reads from the persistent store overlaid with
//! those changes, and applies them in a single persistent transaction when
//! it flushes.
//!
//! Sessions are created by the [`TransientEntityStore`] and handed out as
//! `Arc<TransientSession>`. Entity handles, property accessors and link
//! delegates all take the session explicitly.

mod association;
mod delete;
mod flush;
mod state;

pub use state::SessionStatus;

pub(crate) use state::Refactoring;

use crate::entity::{EntityKey, TransientEntity};
use crate::error::{CoreError, CoreResult};
use crate::store::TransientEntityStore;
use crate::types::SessionId;
use parking_lot::{Mutex, MutexGuard};
use state::{Change, SessionState};
use std::backtrace::Backtrace;
use std::fmt;
use transidb_storage::{PersistentEntityId, PersistentStore, PropertyValue};

/// A transient, thread-affine unit of work.
pub struct TransientSession {
    id: SessionId,
    readonly: bool,
    store: TransientEntityStore,
    state: Mutex<SessionState>,
    creation_backtrace: Option<Backtrace>,
}

impl TransientSession {
    pub(crate) fn new(
        store: TransientEntityStore,
        id: SessionId,
        readonly: bool,
        track_creation: bool,
    ) -> Self {
        Self {
            id,
            readonly,
            store,
            state: Mutex::new(SessionState::default()),
            creation_backtrace: track_creation.then(Backtrace::force_capture),
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns `true` if the session rejects mutations.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    /// Returns `true` until the session is committed or aborted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status() == SessionStatus::Open
    }

    /// Returns `true` if the session has unflushed changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.state.lock().has_changes()
    }

    /// Returns the store that created this session.
    #[must_use]
    pub fn store(&self) -> &TransientEntityStore {
        &self.store
    }

    /// Returns where the session was created, if tracking is enabled.
    #[must_use]
    pub fn creation_backtrace(&self) -> Option<&Backtrace> {
        self.creation_backtrace.as_ref()
    }

    fn persistent(&self) -> &dyn PersistentStore {
        self.store.persistent_store()
    }

    fn lock_open(&self) -> CoreResult<MutexGuard<'_, SessionState>> {
        let state = self.state.lock();
        if state.status != SessionStatus::Open {
            return Err(CoreError::SessionNotActive { session: self.id });
        }
        Ok(state)
    }

    fn lock_writable(&self) -> CoreResult<MutexGuard<'_, SessionState>> {
        let state = self.lock_open()?;
        if self.readonly {
            return Err(CoreError::ReadonlySession { session: self.id });
        }
        Ok(state)
    }

    /// Creates a new entity of a declared type.
    ///
    /// The entity exists only in this session until it flushes.
    pub fn new_entity(&self, entity_type: &str) -> CoreResult<TransientEntity> {
        let mut state = self.lock_writable()?;
        if !self.store.model().contains(entity_type) {
            return Err(CoreError::unknown_entity_type(entity_type));
        }
        let entity = TransientEntity::new(entity_type, self.id);
        state.changes.push(Change::NewEntity {
            id: entity.transient_id(),
            entity_type: entity_type.to_string(),
        });
        state.created.push(entity.clone());
        state.touch(&entity);
        Ok(entity)
    }

    /// Wraps a stored entity.
    pub fn entity(&self, id: PersistentEntityId) -> CoreResult<TransientEntity> {
        let state = self.lock_open()?;
        let entity = self.handle(&state, EntityKey::Saved(id))?;
        if state.removed.contains(&entity.key()) || !self.persistent().entity_exists(id)? {
            return Err(CoreError::entity_removed(&entity));
        }
        Ok(entity)
    }

    /// Returns every live entity of a type, stored ones first.
    pub fn entities(&self, entity_type: &str) -> CoreResult<Vec<TransientEntity>> {
        let state = self.lock_open()?;
        let mut result: Vec<TransientEntity> = self
            .persistent()
            .entities_of_type(entity_type)?
            .into_iter()
            .filter(|id| !state.removed.contains(&EntityKey::Saved(*id)))
            .map(|id| TransientEntity::saved(entity_type, self.id, id))
            .collect();
        result.extend(
            state
                .created
                .iter()
                .filter(|e| e.entity_type() == entity_type && !state.removed.contains(&e.key()))
                .cloned(),
        );
        Ok(result)
    }

    /// Binds an entity handle to this session.
    ///
    /// Handles of this session are returned as they are. Saved entities of
    /// other sessions are rebound.
    ///
    /// # Errors
    ///
    /// Fails with `EntityRemoved` if the entity was deleted, and with
    /// `ForeignSessionEntity` for a never-flushed entity of another session.
    pub fn reattach(&self, entity: &TransientEntity) -> CoreResult<TransientEntity> {
        let state = self.lock_open()?;
        self.attach(&state, entity)
    }

    fn attach(&self, state: &SessionState, entity: &TransientEntity) -> CoreResult<TransientEntity> {
        let key = entity.key();
        if state.removed.contains(&key) {
            return Err(CoreError::entity_removed(entity));
        }
        if let EntityKey::Saved(id) = key {
            if !self.persistent().entity_exists(id)? {
                return Err(CoreError::entity_removed(entity));
            }
        }
        if entity.session_id() == self.id {
            return Ok(entity.clone());
        }
        match entity.persistent_id() {
            Some(id) => Ok(TransientEntity::saved(entity.entity_type(), self.id, id)),
            None => Err(CoreError::ForeignSessionEntity {
                entity: entity.to_string(),
                session: entity.session_id(),
            }),
        }
    }

    /// Returns `true` if the entity was deleted.
    pub fn is_removed(&self, entity: &TransientEntity) -> CoreResult<bool> {
        let state = self.lock_open()?;
        let key = entity.key();
        if state.removed.contains(&key) {
            return Ok(true);
        }
        match key {
            EntityKey::Saved(id) => Ok(!self.persistent().entity_exists(id)?),
            EntityKey::New(_) => Ok(false),
        }
    }

    /// Reads a property.
    pub fn get_property(
        &self,
        entity: &TransientEntity,
        name: &str,
    ) -> CoreResult<Option<PropertyValue>> {
        let state = self.lock_open()?;
        let entity = self.attach(&state, entity)?;
        self.read_property(&state, entity.key(), name)
    }

    /// Writes a property. `None` removes the value.
    pub fn set_property(
        &self,
        entity: &TransientEntity,
        name: &str,
        value: Option<PropertyValue>,
    ) -> CoreResult<()> {
        let mut state = self.lock_writable()?;
        let entity = self.attach(&state, entity)?;
        let key = entity.key();
        state
            .properties
            .entry(key)
            .or_default()
            .insert(name.to_string(), value.clone());
        state.changes.push(Change::SetProperty {
            entity: key,
            name: name.to_string(),
            value,
        });
        state.touch_property(&entity, name);
        Ok(())
    }

    /// Reads the first target of a link.
    pub fn get_link(&self, entity: &TransientEntity, name: &str) -> CoreResult<Option<TransientEntity>> {
        let state = self.lock_open()?;
        let entity = self.attach(&state, entity)?;
        match self.read_link(&state, entity.key(), name)? {
            Some(target) => Ok(Some(self.handle(&state, target)?)),
            None => Ok(None),
        }
    }

    /// Reads all targets of a link, in insertion order.
    pub fn get_links(&self, entity: &TransientEntity, name: &str) -> CoreResult<Vec<TransientEntity>> {
        let state = self.lock_open()?;
        let entity = self.attach(&state, entity)?;
        self.read_links(&state, entity.key(), name)?
            .into_iter()
            .map(|target| self.handle(&state, target))
            .collect()
    }

    /// Queues a persistent mutation to run when the session flushes.
    pub(crate) fn schedule(&self, refactoring: Refactoring) -> CoreResult<()> {
        let mut state = self.lock_writable()?;
        state.changes.push(Change::Refactoring(refactoring));
        Ok(())
    }

    fn handle(&self, state: &SessionState, key: EntityKey) -> CoreResult<TransientEntity> {
        match key {
            EntityKey::New(id) => state.created_entity(id).cloned().ok_or_else(|| {
                CoreError::invalid_operation(format!("{id} is not an entity of {}", self.id))
            }),
            EntityKey::Saved(id) => {
                let entity_type = self.persistent().entity_type_name(id.type_id())?;
                Ok(TransientEntity::saved(entity_type, self.id, id))
            }
        }
    }

    fn read_property(
        &self,
        state: &SessionState,
        key: EntityKey,
        name: &str,
    ) -> CoreResult<Option<PropertyValue>> {
        if let Some(value) = state.properties.get(&key).and_then(|p| p.get(name)) {
            return Ok(value.clone());
        }
        match key {
            EntityKey::New(_) => Ok(None),
            EntityKey::Saved(id) => Ok(self.persistent().get_property(id, name)?),
        }
    }

    fn read_link(&self, state: &SessionState, key: EntityKey, name: &str) -> CoreResult<Option<EntityKey>> {
        if let Some(targets) = state.links.get(&key).and_then(|l| l.get(name)) {
            return Ok(targets.first().copied());
        }
        match key {
            EntityKey::New(_) => Ok(None),
            EntityKey::Saved(id) => Ok(self.persistent().get_link(id, name)?.map(EntityKey::Saved)),
        }
    }

    fn read_links(&self, state: &SessionState, key: EntityKey, name: &str) -> CoreResult<Vec<EntityKey>> {
        if let Some(targets) = state.links.get(&key).and_then(|l| l.get(name)) {
            return Ok(targets.clone());
        }
        match key {
            EntityKey::New(_) => Ok(Vec::new()),
            EntityKey::Saved(id) => Ok(self
                .persistent()
                .get_links(id, name)?
                .into_iter()
                .map(EntityKey::Saved)
                .collect()),
        }
    }
}

impl fmt::Debug for TransientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientSession")
            .field("id", &self.id)
            .field("readonly", &self.readonly)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TransientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} readonly={} status={:?}",
            self.id,
            self.readonly,
            self.status()
        )
    }
}
