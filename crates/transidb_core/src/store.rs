//! The transient entity store.

use crate::config::StoreConfig;
use crate::entity::AnyEntity;
use crate::error::{CoreError, CoreResult};
use crate::listener::{EventsMultiplexer, PriorityListeners, SessionListener};
use crate::model::ModelRegistry;
use crate::session::TransientSession;
use crate::stats::StoreStats;
use crate::types::SessionId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{FairMutex, RwLock};
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use transidb_storage::{PersistentEntityId, PersistentStore, PersistentTransaction};

/// Type-erased cached instance.
pub type CachedInstance = Arc<dyn Any + Send + Sync>;

/// Coordinator of transient sessions over one persistent store.
///
/// `TransientEntityStore` is a cheap handle; clones share the same state.
/// It provides:
/// - Session creation, registration and per-thread binding
/// - Suspend and resume of a thread's session
/// - A fair lock serializing every session flush
/// - Prioritized session listeners and an optional events multiplexer
/// - Lookup caches for enum values and persistent class instances
/// - Deferred refactorings of the persistent store
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use transidb_core::{EntityTypeModel, ModelRegistry, PropertyModel, StoreConfig, TransientEntityStore};
/// use transidb_storage::{InMemoryStore, PropertyValue};
///
/// let model = ModelRegistry::new()
///     .with_type(EntityTypeModel::new("User").property(PropertyModel::new("login").required()));
/// let store = TransientEntityStore::new(Arc::new(InMemoryStore::new()), model, StoreConfig::default());
///
/// let session = store.begin_session().unwrap();
/// let user = session.new_entity("User").unwrap();
/// session.set_property(&user, "login", Some(PropertyValue::from("alice"))).unwrap();
/// session.commit().unwrap();
///
/// assert!(user.persistent_id().is_some());
/// assert!(store.thread_session().is_none());
/// store.close();
/// ```
#[derive(Clone)]
pub struct TransientEntityStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    persistent: Arc<dyn PersistentStore>,
    model: ModelRegistry,
    config: StoreConfig,
    /// Live sessions.
    sessions: DashMap<SessionId, Arc<TransientSession>>,
    /// Session bound to each worker thread.
    bindings: DashMap<ThreadId, Arc<TransientSession>>,
    next_session_id: AtomicU64,
    flush_lock: FairMutex<()>,
    listeners: PriorityListeners,
    multiplexer: RwLock<Option<Arc<dyn EventsMultiplexer>>>,
    enum_cache: DashMap<(String, String), PersistentEntityId>,
    classes_by_name: DashMap<String, CachedInstance>,
    classes_by_type: DashMap<TypeId, CachedInstance>,
    is_open: AtomicBool,
    /// Set by `close()` after `is_open` is cleared. Accessed with
    /// `Ordering::Relaxed`: a session may still begin on another thread
    /// between the two stores.
    closed: AtomicBool,
    stats: StoreStats,
}

impl TransientEntityStore {
    /// Creates a store over a persistent store.
    ///
    /// The persistent store's environment is adjusted once: downgrade after
    /// flush is turned off unless `config` sets it, transaction replay is
    /// unbounded in count and time, and garbage collection uses exclusive
    /// transactions.
    pub fn new(
        persistent: Arc<dyn PersistentStore>,
        model: ModelRegistry,
        config: StoreConfig,
    ) -> Self {
        let environment = persistent
            .environment_config()
            .txn_downgrade_after_flush(config.txn_downgrade_after_flush.unwrap_or(false))
            .txn_replay_max_count(u32::MAX)
            .txn_replay_timeout(Duration::MAX)
            .gc_use_exclusive_transaction(true);
        persistent.set_environment_config(environment);
        debug!(store = persistent.name(), "transient entity store attached");

        Self {
            inner: Arc::new(StoreInner {
                persistent,
                model,
                sessions: DashMap::with_capacity(config.expected_sessions),
                bindings: DashMap::new(),
                config,
                next_session_id: AtomicU64::new(1),
                flush_lock: FairMutex::new(()),
                listeners: PriorityListeners::new(),
                multiplexer: RwLock::new(None),
                enum_cache: DashMap::new(),
                classes_by_name: DashMap::new(),
                classes_by_type: DashMap::new(),
                is_open: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                stats: StoreStats::new(),
            }),
        }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Returns the calling thread's session, creating one if there is none.
    ///
    /// # Errors
    ///
    /// Returns `StoreClosed` if the store was closed.
    pub fn begin_session(&self) -> CoreResult<Arc<TransientSession>> {
        self.ensure_not_closed()?;
        if let Some(session) = self.thread_session() {
            debug!(session = %session.id(), "reusing thread session");
            return Ok(session);
        }
        let session = self.create_session(false);
        self.register_store_session(&session)?;
        Ok(session)
    }

    /// Starts a new read-only session bound to the calling thread.
    ///
    /// Unlike [`begin_session`](Self::begin_session), an existing thread
    /// session is never reused.
    pub fn begin_readonly_transaction(&self) -> CoreResult<Arc<TransientSession>> {
        self.ensure_not_closed()?;
        let session = self.create_session(true);
        self.register_store_session(&session)?;
        Ok(session)
    }

    /// Binds a suspended session to the calling thread.
    ///
    /// `None` does nothing.
    ///
    /// # Errors
    ///
    /// Returns `SessionAlreadyBound` if the thread has a different session.
    pub fn resume_session(&self, session: Option<&Arc<TransientSession>>) -> CoreResult<()> {
        let Some(session) = session else {
            return Ok(());
        };
        self.ensure_not_closed()?;
        match self.inner.bindings.entry(thread::current().id()) {
            Entry::Occupied(bound) if bound.get().id() != session.id() => {
                Err(CoreError::SessionAlreadyBound {
                    current: bound.get().id(),
                    requested: session.id(),
                })
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(session));
                debug!(session = %session.id(), "session resumed");
                Ok(())
            }
        }
    }

    /// Detaches the calling thread's session and returns it.
    ///
    /// The session stays registered and can be resumed on any thread.
    pub fn suspend_thread_session(&self) -> CoreResult<Option<Arc<TransientSession>>> {
        self.ensure_not_closed()?;
        let session = self
            .inner
            .bindings
            .remove(&thread::current().id())
            .map(|(_, session)| session);
        if let Some(session) = &session {
            debug!(session = %session.id(), "session suspended");
        }
        Ok(session)
    }

    /// Returns the session bound to the calling thread.
    #[must_use]
    pub fn thread_session(&self) -> Option<Arc<TransientSession>> {
        self.inner
            .bindings
            .get(&thread::current().id())
            .map(|bound| Arc::clone(bound.value()))
    }

    /// Registers a live session and binds it to the calling thread.
    ///
    /// # Errors
    ///
    /// Returns `SessionAlreadyRegistered` if the session is registered.
    pub fn register_store_session(&self, session: &Arc<TransientSession>) -> CoreResult<()> {
        match self.inner.sessions.entry(session.id()) {
            Entry::Occupied(_) => {
                return Err(CoreError::SessionAlreadyRegistered {
                    session: session.id(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(session));
            }
        }
        self.bind(session);
        debug!(session = %session.id(), "session registered");
        Ok(())
    }

    /// Unregisters a session and removes every thread binding to it.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotRegistered` if the session is not registered.
    pub fn unregister_store_session(&self, session: &TransientSession) -> CoreResult<()> {
        if self.unregister_session(session.id()) {
            Ok(())
        } else {
            Err(CoreError::SessionNotRegistered {
                session: session.id(),
            })
        }
    }

    /// Returns `true` if the session was registered.
    pub(crate) fn unregister_session(&self, id: SessionId) -> bool {
        let removed = self.inner.sessions.remove(&id).is_some();
        self.inner.bindings.retain(|_, bound| bound.id() != id);
        if removed {
            debug!(session = %id, "session unregistered");
        }
        removed
    }

    fn bind(&self, session: &Arc<TransientSession>) {
        self.inner
            .bindings
            .insert(thread::current().id(), Arc::clone(session));
    }

    fn create_session(&self, readonly: bool) -> Arc<TransientSession> {
        let id = SessionId::new(self.inner.next_session_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(TransientSession::new(
            self.clone(),
            id,
            readonly,
            self.inner.config.track_session_creation,
        ));
        self.inner.stats.record_session_begin();
        debug!(session = %id, readonly, "session created");
        session
    }

    fn ensure_not_closed(&self) -> CoreResult<()> {
        if self.inner.closed.load(Ordering::Relaxed) {
            Err(CoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    /// Runs `f` in a session and commits it.
    ///
    /// A writable call reuses the calling thread's writable session, if any,
    /// and leaves committing to its owner. Otherwise a new session is begun,
    /// committed when `f` succeeds and aborted when `f` or the commit fails.
    /// A read-only call restores the thread's previous session afterwards.
    pub fn transactional<T, F>(&self, readonly: bool, f: F) -> CoreResult<T>
    where
        F: FnOnce(&TransientSession) -> CoreResult<T>,
    {
        let previous = self.thread_session();
        if let Some(session) = previous.as_ref().filter(|s| !readonly && !s.is_readonly()) {
            return f(session);
        }

        self.ensure_not_closed()?;
        let session = self.create_session(readonly);
        self.register_store_session(&session)?;
        let result = f(&session).and_then(|value| session.commit().map(|()| value));
        if result.is_err() && session.is_open() {
            if let Err(err) = session.abort() {
                warn!(session = %session.id(), error = %err, "failed to abort session");
            }
        }
        if let Some(previous) = previous.filter(|p| p.is_open() && p.id() != session.id()) {
            self.bind(&previous);
        }
        result
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Closes the store.
    ///
    /// Sessions that are still live are reported and left as they are.
    /// Closing twice does nothing.
    pub fn close(&self) {
        if !self.inner.is_open.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(multiplexer) = self.events_multiplexer() {
            multiplexer.on_close(self);
        }
        info!(store = self.inner.persistent.name(), "closing transient entity store");
        self.inner.closed.store(true, Ordering::Relaxed);

        let leaked = self.inner.sessions.len();
        if leaked > 0 {
            warn!(sessions = leaked, "transient store closed with open sessions");
            if tracing::enabled!(Level::DEBUG) {
                for session in self.inner.sessions.iter() {
                    if let Some(backtrace) = session.creation_backtrace() {
                        warn!(session = %session.id(), "leaked session created at:\n{backtrace}");
                    }
                }
            }
        }
    }

    /// Returns `true` until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_open.load(Ordering::SeqCst)
    }

    /// Returns `true` if the persistent store knows the entity type.
    ///
    /// Lookup failures count as absent.
    #[must_use]
    pub fn entity_type_exists(&self, name: &str) -> bool {
        self.inner.persistent.entity_type_id(name).is_ok()
    }

    // ========================================================================
    // Refactorings
    // ========================================================================

    fn require_thread_session(&self) -> CoreResult<Arc<TransientSession>> {
        self.thread_session().ok_or(CoreError::NoThreadSession)
    }

    /// Renames an entity type when the thread session flushes.
    pub fn rename_entity_type_refactoring(&self, old_name: &str, new_name: &str) -> CoreResult<()> {
        let session = self.require_thread_session()?;
        let (old_name, new_name) = (old_name.to_string(), new_name.to_string());
        session.schedule(Arc::new(move |txn: &mut dyn PersistentTransaction| {
            txn.rename_entity_type(&old_name, &new_name)
        }))
    }

    /// Deletes an entity type with all its entities when the thread session
    /// flushes.
    pub fn delete_entity_type_refactoring(&self, name: &str) -> CoreResult<()> {
        let session = self.require_thread_session()?;
        let name = name.to_string();
        session.schedule(Arc::new(move |txn: &mut dyn PersistentTransaction| {
            txn.delete_entity_type(&name)
        }))
    }

    /// Deletes an entity in the thread session.
    ///
    /// A transient entity is deleted through the session, so link policies
    /// apply. A raw persistent entity is deleted as is when the session
    /// flushes.
    pub fn delete_entity_refactoring(&self, entity: impl Into<AnyEntity>) -> CoreResult<()> {
        let session = self.require_thread_session()?;
        match entity.into() {
            AnyEntity::Transient(entity) => session.delete_entity(&entity),
            AnyEntity::Persistent(id) => {
                session.schedule(Arc::new(move |txn: &mut dyn PersistentTransaction| {
                    txn.delete_entity(id).map(|_| ())
                }))
            }
        }
    }

    /// Deletes every target of a link when the thread session flushes.
    ///
    /// # Errors
    ///
    /// Returns `CannotUnwrap` for an entity that was never flushed.
    pub fn delete_links_refactoring(&self, entity: impl Into<AnyEntity>, link: &str) -> CoreResult<()> {
        let session = self.require_thread_session()?;
        let id = entity.into().unwrap_persistent()?;
        let link = link.to_string();
        session.schedule(Arc::new(move |txn: &mut dyn PersistentTransaction| {
            txn.delete_links(id, &link)
        }))
    }

    /// Deletes one link target when the thread session flushes.
    ///
    /// # Errors
    ///
    /// Returns `CannotUnwrap` if either entity was never flushed.
    pub fn delete_link_refactoring(
        &self,
        entity: impl Into<AnyEntity>,
        link: &str,
        target: impl Into<AnyEntity>,
    ) -> CoreResult<()> {
        let session = self.require_thread_session()?;
        let id = entity.into().unwrap_persistent()?;
        let target = target.into().unwrap_persistent()?;
        let link = link.to_string();
        session.schedule(Arc::new(move |txn: &mut dyn PersistentTransaction| {
            txn.delete_link(id, &link, target).map(|_| ())
        }))
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Adds a listener with priority 0.
    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        self.add_listener_with_priority(listener, 0);
    }

    /// Adds a listener. Higher priorities fire first.
    pub fn add_listener_with_priority(&self, listener: Arc<dyn SessionListener>, priority: i32) {
        self.inner.listeners.add(listener, priority);
    }

    /// Removes a listener by identity. Returns `true` if it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn SessionListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub(crate) fn for_all_listeners(&self, action: impl FnMut(&Arc<dyn SessionListener>)) {
        self.inner.listeners.for_each(action);
    }

    /// Attaches or detaches the events multiplexer.
    pub fn set_events_multiplexer(&self, multiplexer: Option<Arc<dyn EventsMultiplexer>>) {
        *self.inner.multiplexer.write() = multiplexer;
    }

    /// Returns the attached events multiplexer.
    #[must_use]
    pub fn events_multiplexer(&self) -> Option<Arc<dyn EventsMultiplexer>> {
        self.inner.multiplexer.read().clone()
    }

    // ========================================================================
    // Caches
    // ========================================================================

    /// Returns the cached entity of an enum constant.
    #[must_use]
    pub fn cached_enum_value(&self, entity_type: &str, property: &str) -> Option<PersistentEntityId> {
        self.inner
            .enum_cache
            .get(&(entity_type.to_string(), property.to_string()))
            .map(|id| *id)
    }

    /// Caches the entity of an enum constant.
    pub fn set_cached_enum_value(&self, entity_type: &str, property: &str, id: PersistentEntityId) {
        self.inner
            .enum_cache
            .insert((entity_type.to_string(), property.to_string()), id);
    }

    /// Returns the persistent class instance cached for an entity type.
    #[must_use]
    pub fn cached_persistent_class(&self, entity_type: &str) -> Option<CachedInstance> {
        self.inner
            .classes_by_name
            .get(entity_type)
            .map(|instance| Arc::clone(instance.value()))
    }

    /// Returns the cached persistent class instance of type `T`.
    #[must_use]
    pub fn cached_persistent_class_of<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let instance = self
            .inner
            .classes_by_type
            .get(&TypeId::of::<T>())
            .map(|instance| Arc::clone(instance.value()))?;
        instance.downcast::<T>().ok()
    }

    /// Caches a persistent class instance under its entity type and its
    /// concrete type.
    ///
    /// An earlier instance of the same concrete type is replaced.
    pub fn set_cached_persistent_class<T: Any + Send + Sync>(&self, entity_type: &str, instance: Arc<T>) {
        let instance: CachedInstance = instance;
        if self
            .inner
            .classes_by_type
            .insert(TypeId::of::<T>(), Arc::clone(&instance))
            .is_some()
        {
            warn!(
                class = type_name::<T>(),
                entity_type, "persistent class instance registered more than once"
            );
        }
        self.inner
            .classes_by_name
            .insert(entity_type.to_string(), instance);
    }

    // ========================================================================
    // Accessors and diagnostics
    // ========================================================================

    /// Returns the lock that serializes session flushes.
    ///
    /// Waiters acquire it in arrival order.
    #[must_use]
    pub fn flush_lock(&self) -> &FairMutex<()> {
        &self.inner.flush_lock
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn sessions_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Describes every live session, one per line, by ascending ID.
    #[must_use]
    pub fn dump_sessions(&self) -> String {
        let mut sessions: Vec<Arc<TransientSession>> = self
            .inner
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        sessions.sort_by_key(|session| session.id());
        sessions
            .iter()
            .map(|session| format!("{session}\n"))
            .collect()
    }

    /// Returns the store statistics.
    #[must_use]
    pub fn stats(&self) -> &StoreStats {
        &self.inner.stats
    }

    /// Returns the persistent store.
    #[must_use]
    pub fn persistent_store(&self) -> &dyn PersistentStore {
        self.inner.persistent.as_ref()
    }

    /// Returns the entity model.
    #[must_use]
    pub fn model(&self) -> &ModelRegistry {
        &self.inner.model
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }
}

impl fmt::Debug for TransientEntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientEntityStore")
            .field("persistent", &self.inner.persistent.name())
            .field("is_open", &self.is_open())
            .field("sessions", &self.sessions_count())
            .finish_non_exhaustive()
    }
}
