//! Persistent store trait definitions.

use crate::config::EnvironmentConfig;
use crate::error::StorageResult;
use crate::types::{EntityTypeId, PersistentEntityId, PropertyValue};

/// A transactional entity store underneath the transient layer.
///
/// The store is an opaque collaborator. The transient layer reads committed
/// state through it and applies buffered changes through
/// [`PersistentTransaction`]s.
///
/// # Invariants
///
/// - Reads observe the latest committed state
/// - Changes made in a transaction become visible only after `commit`
/// - At most one write transaction is open at a time; `begin_transaction`
///   blocks until the previous one finishes
/// - Stores must be `Send + Sync` for concurrent access
pub trait PersistentStore: Send + Sync {
    /// Returns a human readable name of the store.
    fn name(&self) -> &str;

    /// Returns the current environment configuration.
    fn environment_config(&self) -> EnvironmentConfig;

    /// Replaces the environment configuration.
    fn set_environment_config(&self, config: EnvironmentConfig);

    /// Looks up the numeric id of an entity type.
    ///
    /// # Errors
    ///
    /// Returns `EntityTypeNotFound` if no such type exists, or any
    /// infrastructure error encountered during the lookup.
    fn entity_type_id(&self, name: &str) -> StorageResult<EntityTypeId>;

    /// Returns the name of the entity type with the given id.
    fn entity_type_name(&self, type_id: EntityTypeId) -> StorageResult<String>;

    /// Checks whether an entity exists.
    fn entity_exists(&self, id: PersistentEntityId) -> StorageResult<bool>;

    /// Returns the ids of all entities of a type.
    fn entities_of_type(&self, name: &str) -> StorageResult<Vec<PersistentEntityId>>;

    /// Reads a property value.
    fn get_property(
        &self,
        id: PersistentEntityId,
        name: &str,
    ) -> StorageResult<Option<PropertyValue>>;

    /// Reads the first target of a link.
    fn get_link(&self, id: PersistentEntityId, name: &str)
        -> StorageResult<Option<PersistentEntityId>>;

    /// Reads all targets of a link, in insertion order.
    fn get_links(&self, id: PersistentEntityId, name: &str) -> StorageResult<Vec<PersistentEntityId>>;

    /// Begins a write transaction.
    ///
    /// Blocks while another write transaction is open.
    fn begin_transaction(&self) -> StorageResult<Box<dyn PersistentTransaction + '_>>;
}

/// A write transaction against a [`PersistentStore`].
///
/// Dropping a transaction without committing discards its changes.
pub trait PersistentTransaction {
    /// Creates an entity, registering its type if needed.
    fn new_entity(&mut self, entity_type: &str) -> StorageResult<PersistentEntityId>;

    /// Deletes an entity and every link pointing at it. Returns `false` if
    /// it did not exist.
    fn delete_entity(&mut self, id: PersistentEntityId) -> StorageResult<bool>;

    /// Sets a property value.
    fn set_property(
        &mut self,
        id: PersistentEntityId,
        name: &str,
        value: PropertyValue,
    ) -> StorageResult<()>;

    /// Deletes a property. Returns `false` if it was not set.
    fn delete_property(&mut self, id: PersistentEntityId, name: &str) -> StorageResult<bool>;

    /// Adds a link target. Returns `false` if the link already existed.
    fn add_link(
        &mut self,
        id: PersistentEntityId,
        name: &str,
        target: PersistentEntityId,
    ) -> StorageResult<bool>;

    /// Replaces all targets of a link with a single target.
    fn set_link(
        &mut self,
        id: PersistentEntityId,
        name: &str,
        target: PersistentEntityId,
    ) -> StorageResult<()>;

    /// Deletes one link target. Returns `false` if it was not linked.
    fn delete_link(
        &mut self,
        id: PersistentEntityId,
        name: &str,
        target: PersistentEntityId,
    ) -> StorageResult<bool>;

    /// Deletes all targets of a link.
    fn delete_links(&mut self, id: PersistentEntityId, name: &str) -> StorageResult<()>;

    /// Renames an entity type, keeping its id and entities.
    fn rename_entity_type(&mut self, old_name: &str, new_name: &str) -> StorageResult<()>;

    /// Deletes an entity type together with all its entities and the links
    /// pointing at them.
    fn delete_entity_type(&mut self, name: &str) -> StorageResult<()>;

    /// Atomically publishes all changes made in this transaction.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards all changes made in this transaction.
    fn abort(self: Box<Self>);
}
