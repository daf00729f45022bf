//! In-memory persistent store.

use crate::config::EnvironmentConfig;
use crate::error::{StorageError, StorageResult};
use crate::store::{PersistentStore, PersistentTransaction};
use crate::types::{EntityTypeId, PersistentEntityId, PropertyValue};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A stored entity.
#[derive(Debug, Clone, Default)]
struct EntityRecord {
    properties: BTreeMap<String, PropertyValue>,
    links: BTreeMap<String, Vec<PersistentEntityId>>,
}

/// The complete committed contents of the store.
#[derive(Debug, Clone, Default)]
struct StoreState {
    type_ids: BTreeMap<String, EntityTypeId>,
    type_names: BTreeMap<EntityTypeId, String>,
    next_type_id: EntityTypeId,
    next_local_ids: HashMap<EntityTypeId, u64>,
    entities: BTreeMap<PersistentEntityId, EntityRecord>,
}

impl StoreState {
    fn type_id_or_create(&mut self, name: &str) -> EntityTypeId {
        if let Some(&id) = self.type_ids.get(name) {
            return id;
        }
        let id = self.next_type_id;
        self.next_type_id += 1;
        self.type_ids.insert(name.to_string(), id);
        self.type_names.insert(id, name.to_string());
        id
    }

    fn record(&self, id: PersistentEntityId) -> StorageResult<&EntityRecord> {
        self.entities
            .get(&id)
            .ok_or(StorageError::EntityNotFound { id })
    }

    fn record_mut(&mut self, id: PersistentEntityId) -> StorageResult<&mut EntityRecord> {
        self.entities
            .get_mut(&id)
            .ok_or(StorageError::EntityNotFound { id })
    }

    fn ensure_exists(&self, id: PersistentEntityId) -> StorageResult<()> {
        self.record(id).map(|_| ())
    }

    /// Drops every link whose target no longer has a record.
    fn strip_dangling_links(&mut self) {
        let live: BTreeSet<PersistentEntityId> = self.entities.keys().copied().collect();
        for record in self.entities.values_mut() {
            record.links.retain(|_, targets| {
                targets.retain(|t| live.contains(t));
                !targets.is_empty()
            });
        }
    }
}

/// An in-memory entity store.
///
/// This store keeps everything in memory and is suitable for:
/// - Unit and integration tests
/// - Embedding where durability is not required
///
/// # Concurrency
///
/// Reads go against the last committed state. Write transactions work on a
/// private copy and publish it on commit; a writer lock admits one write
/// transaction at a time.
///
/// # Example
///
/// ```rust
/// use transidb_storage::{InMemoryStore, PersistentStore};
///
/// let store = InMemoryStore::new();
/// let mut txn = store.begin_transaction().unwrap();
/// let parent = txn.new_entity("Folder").unwrap();
/// let child = txn.new_entity("File").unwrap();
/// txn.add_link(parent, "files", child).unwrap();
/// txn.commit().unwrap();
///
/// assert_eq!(store.get_links(parent, "files").unwrap(), vec![child]);
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    state: RwLock<StoreState>,
    write_lock: Mutex<()>,
    config: RwLock<EnvironmentConfig>,
    closed: AtomicBool,
    fail_type_lookups: AtomicBool,
    commits: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_name("in-memory store")
    }

    /// Creates a new empty store with a display name.
    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(StoreState::default()),
            write_lock: Mutex::new(()),
            config: RwLock::new(EnvironmentConfig::DEFAULT),
            closed: AtomicBool::new(false),
            fail_type_lookups: AtomicBool::new(false),
            commits: AtomicU64::new(0),
        }
    }

    /// Makes every entity type lookup fail with an I/O error.
    ///
    /// Useful for testing how callers handle infrastructure failures.
    pub fn set_type_lookup_failure(&self, fail: bool) {
        self.fail_type_lookups.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of committed transactions.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Returns the number of stored entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.state.read().entities.len()
    }

    /// Closes the store. Every later operation fails with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn environment_config(&self) -> EnvironmentConfig {
        *self.config.read()
    }

    fn set_environment_config(&self, config: EnvironmentConfig) {
        *self.config.write() = config;
    }

    fn entity_type_id(&self, name: &str) -> StorageResult<EntityTypeId> {
        self.ensure_open()?;
        if self.fail_type_lookups.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("injected failure while looking up entity type {name}"),
            )));
        }
        self.state
            .read()
            .type_ids
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::entity_type_not_found(name))
    }

    fn entity_type_name(&self, type_id: EntityTypeId) -> StorageResult<String> {
        self.ensure_open()?;
        self.state
            .read()
            .type_names
            .get(&type_id)
            .cloned()
            .ok_or_else(|| StorageError::entity_type_not_found(format!("#{type_id}")))
    }

    fn entity_exists(&self, id: PersistentEntityId) -> StorageResult<bool> {
        self.ensure_open()?;
        Ok(self.state.read().entities.contains_key(&id))
    }

    fn entities_of_type(&self, name: &str) -> StorageResult<Vec<PersistentEntityId>> {
        self.ensure_open()?;
        let state = self.state.read();
        let Some(&type_id) = state.type_ids.get(name) else {
            return Ok(Vec::new());
        };
        Ok(state
            .entities
            .keys()
            .filter(|id| id.type_id() == type_id)
            .copied()
            .collect())
    }

    fn get_property(
        &self,
        id: PersistentEntityId,
        name: &str,
    ) -> StorageResult<Option<PropertyValue>> {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(state.record(id)?.properties.get(name).cloned())
    }

    fn get_link(
        &self,
        id: PersistentEntityId,
        name: &str,
    ) -> StorageResult<Option<PersistentEntityId>> {
        Ok(self.get_links(id, name)?.into_iter().next())
    }

    fn get_links(&self, id: PersistentEntityId, name: &str) -> StorageResult<Vec<PersistentEntityId>> {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(state
            .record(id)?
            .links
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn begin_transaction(&self) -> StorageResult<Box<dyn PersistentTransaction + '_>> {
        self.ensure_open()?;
        // Single writer: held until commit or abort
        let guard = self.write_lock.lock();
        let working = self.state.read().clone();
        Ok(Box::new(InMemoryTransaction {
            store: self,
            working,
            _guard: guard,
        }))
    }
}

/// A write transaction of an [`InMemoryStore`].
///
/// Holds the store's writer lock for its whole lifetime.
pub struct InMemoryTransaction<'a> {
    store: &'a InMemoryStore,
    working: StoreState,
    _guard: MutexGuard<'a, ()>,
}

impl PersistentTransaction for InMemoryTransaction<'_> {
    fn new_entity(&mut self, entity_type: &str) -> StorageResult<PersistentEntityId> {
        let type_id = self.working.type_id_or_create(entity_type);
        let next = self.working.next_local_ids.entry(type_id).or_insert(0);
        let id = PersistentEntityId::new(type_id, *next);
        *next += 1;
        self.working.entities.insert(id, EntityRecord::default());
        Ok(id)
    }

    fn delete_entity(&mut self, id: PersistentEntityId) -> StorageResult<bool> {
        if self.working.entities.remove(&id).is_none() {
            return Ok(false);
        }
        self.working.strip_dangling_links();
        Ok(true)
    }

    fn set_property(
        &mut self,
        id: PersistentEntityId,
        name: &str,
        value: PropertyValue,
    ) -> StorageResult<()> {
        self.working
            .record_mut(id)?
            .properties
            .insert(name.to_string(), value);
        Ok(())
    }

    fn delete_property(&mut self, id: PersistentEntityId, name: &str) -> StorageResult<bool> {
        Ok(self.working.record_mut(id)?.properties.remove(name).is_some())
    }

    fn add_link(
        &mut self,
        id: PersistentEntityId,
        name: &str,
        target: PersistentEntityId,
    ) -> StorageResult<bool> {
        self.working.ensure_exists(target)?;
        let targets = self
            .working
            .record_mut(id)?
            .links
            .entry(name.to_string())
            .or_default();
        if targets.contains(&target) {
            return Ok(false);
        }
        targets.push(target);
        Ok(true)
    }

    fn set_link(
        &mut self,
        id: PersistentEntityId,
        name: &str,
        target: PersistentEntityId,
    ) -> StorageResult<()> {
        self.working.ensure_exists(target)?;
        self.working
            .record_mut(id)?
            .links
            .insert(name.to_string(), vec![target]);
        Ok(())
    }

    fn delete_link(
        &mut self,
        id: PersistentEntityId,
        name: &str,
        target: PersistentEntityId,
    ) -> StorageResult<bool> {
        let record = self.working.record_mut(id)?;
        let Some(targets) = record.links.get_mut(name) else {
            return Ok(false);
        };
        let before = targets.len();
        targets.retain(|t| *t != target);
        let removed = targets.len() != before;
        if targets.is_empty() {
            record.links.remove(name);
        }
        Ok(removed)
    }

    fn delete_links(&mut self, id: PersistentEntityId, name: &str) -> StorageResult<()> {
        self.working.record_mut(id)?.links.remove(name);
        Ok(())
    }

    fn rename_entity_type(&mut self, old_name: &str, new_name: &str) -> StorageResult<()> {
        if self.working.type_ids.contains_key(new_name) {
            return Err(StorageError::entity_type_exists(new_name));
        }
        let id = self
            .working
            .type_ids
            .remove(old_name)
            .ok_or_else(|| StorageError::entity_type_not_found(old_name))?;
        self.working.type_ids.insert(new_name.to_string(), id);
        self.working.type_names.insert(id, new_name.to_string());
        Ok(())
    }

    fn delete_entity_type(&mut self, name: &str) -> StorageResult<()> {
        let id = self
            .working
            .type_ids
            .remove(name)
            .ok_or_else(|| StorageError::entity_type_not_found(name))?;
        self.working.type_names.remove(&id);
        self.working.entities.retain(|e, _| e.type_id() != id);
        self.working.strip_dangling_links();
        Ok(())
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        self.store.ensure_open()?;
        let this = *self;
        *this.store.state.write() = this.working;
        this.store.commits.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(store = %this.store.name, "committed transaction");
        Ok(())
    }

    fn abort(self: Box<Self>) {
        // The working copy is dropped with the transaction
    }
}
