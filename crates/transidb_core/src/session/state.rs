//! Session state.

use crate::change_feed::{ChangeEvent, ChangeType};
use crate::entity::{EntityKey, TransientEntity};
use crate::types::TransientId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use transidb_storage::{
    PersistentEntityId, PersistentTransaction, PropertyValue, StorageError, StorageResult,
};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// The session accepts reads and writes.
    #[default]
    Open,
    /// The session flushed and closed.
    Committed,
    /// The session discarded its changes and closed.
    Aborted,
}

/// A deferred mutation run inside the flush transaction.
pub(crate) type Refactoring =
    Arc<dyn Fn(&mut dyn PersistentTransaction) -> StorageResult<()> + Send + Sync>;

/// One buffered mutation.
///
/// The change log is applied to the persistent store in order.
pub(super) enum Change {
    NewEntity {
        id: TransientId,
        entity_type: String,
    },
    SetProperty {
        entity: EntityKey,
        name: String,
        value: Option<PropertyValue>,
    },
    AddLink {
        entity: EntityKey,
        name: String,
        target: EntityKey,
    },
    SetLink {
        entity: EntityKey,
        name: String,
        target: EntityKey,
    },
    DeleteLink {
        entity: EntityKey,
        name: String,
        target: EntityKey,
    },
    DeleteLinks {
        entity: EntityKey,
        name: String,
    },
    DeleteEntity {
        entity: EntityKey,
    },
    Refactoring(Refactoring),
}

fn resolve(
    ids: &HashMap<TransientId, PersistentEntityId>,
    key: EntityKey,
) -> StorageResult<PersistentEntityId> {
    match key {
        EntityKey::Saved(id) => Ok(id),
        EntityKey::New(id) => ids
            .get(&id)
            .copied()
            .ok_or_else(|| StorageError::Corrupted(format!("{id} used before it was created"))),
    }
}

impl Change {
    /// Applies the change, recording persistent ids of created entities.
    pub(super) fn apply(
        &self,
        txn: &mut dyn PersistentTransaction,
        ids: &mut HashMap<TransientId, PersistentEntityId>,
    ) -> StorageResult<()> {
        match self {
            Self::NewEntity { id, entity_type } => {
                let persistent = txn.new_entity(entity_type)?;
                ids.insert(*id, persistent);
            }
            Self::SetProperty {
                entity,
                name,
                value,
            } => {
                let entity = resolve(ids, *entity)?;
                match value {
                    Some(value) => txn.set_property(entity, name, value.clone())?,
                    None => {
                        txn.delete_property(entity, name)?;
                    }
                }
            }
            Self::AddLink {
                entity,
                name,
                target,
            } => {
                txn.add_link(resolve(ids, *entity)?, name, resolve(ids, *target)?)?;
            }
            Self::SetLink {
                entity,
                name,
                target,
            } => {
                txn.set_link(resolve(ids, *entity)?, name, resolve(ids, *target)?)?;
            }
            Self::DeleteLink {
                entity,
                name,
                target,
            } => {
                txn.delete_link(resolve(ids, *entity)?, name, resolve(ids, *target)?)?;
            }
            Self::DeleteLinks { entity, name } => {
                txn.delete_links(resolve(ids, *entity)?, name)?;
            }
            Self::DeleteEntity { entity } => {
                txn.delete_entity(resolve(ids, *entity)?)?;
            }
            Self::Refactoring(run) => run(txn)?,
        }
        Ok(())
    }
}

/// Pending changes of a session and the overlay reads are served from.
#[derive(Default)]
pub(super) struct SessionState {
    pub(super) status: SessionStatus,
    pub(super) changes: Vec<Change>,
    pub(super) created: Vec<TransientEntity>,
    pub(super) removed: HashSet<EntityKey>,
    pub(super) properties: HashMap<EntityKey, HashMap<String, Option<PropertyValue>>>,
    pub(super) links: HashMap<EntityKey, HashMap<String, Vec<EntityKey>>>,
    touched: Vec<EntityKey>,
    events: HashMap<EntityKey, ChangeEvent>,
}

impl SessionState {
    pub(super) fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub(super) fn created_entity(&self, id: TransientId) -> Option<&TransientEntity> {
        self.created.iter().find(|e| e.transient_id() == id)
    }

    fn event_mut(&mut self, entity: &TransientEntity) -> &mut ChangeEvent {
        let key = entity.key();
        if !self.events.contains_key(&key) {
            self.touched.push(key);
        }
        let change_type = if entity.is_new() {
            ChangeType::Insert
        } else {
            ChangeType::Update
        };
        self.events
            .entry(key)
            .or_insert_with(|| ChangeEvent::new(entity.clone(), change_type))
    }

    pub(super) fn touch(&mut self, entity: &TransientEntity) {
        self.event_mut(entity);
    }

    pub(super) fn touch_property(&mut self, entity: &TransientEntity, name: &str) {
        self.event_mut(entity).properties.insert(name.to_string());
    }

    pub(super) fn touch_link(&mut self, entity: &TransientEntity, name: &str) {
        self.event_mut(entity).links.insert(name.to_string());
    }

    pub(super) fn touch_removed(&mut self, entity: &TransientEntity) {
        self.event_mut(entity).change_type = ChangeType::Delete;
    }

    /// Touched entities in the order they were first touched.
    pub(super) fn touched(&self) -> impl Iterator<Item = (EntityKey, &ChangeEvent)> {
        self.touched
            .iter()
            .filter_map(|key| self.events.get(key).map(|event| (*key, event)))
    }

    /// Change events of the pending flush.
    ///
    /// Entities created and deleted within the same flush are left out.
    pub(super) fn change_events(&self) -> Vec<ChangeEvent> {
        self.touched()
            .filter(|(key, event)| {
                !(matches!(key, EntityKey::New(_)) && event.change_type == ChangeType::Delete)
            })
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Drops all pending changes.
    pub(super) fn clear(&mut self) {
        let status = self.status;
        *self = Self::default();
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    #[test]
    fn events_follow_first_touch_order() {
        let mut state = SessionState::default();
        let a = TransientEntity::new("A", SessionId::new(1));
        let b = TransientEntity::saved("B", SessionId::new(1), PersistentEntityId::new(0, 0));

        state.touch_property(&b, "name");
        state.touch(&a);
        state.touch_link(&b, "owner");

        let events = state.change_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].entity, b);
        assert_eq!(events[0].change_type, ChangeType::Update);
        assert!(events[0].has_property_changed("name"));
        assert!(events[0].has_link_changed("owner"));
        assert_eq!(events[1].change_type, ChangeType::Insert);
    }

    #[test]
    fn created_then_removed_is_not_reported() {
        let mut state = SessionState::default();
        let a = TransientEntity::new("A", SessionId::new(1));
        state.touch(&a);
        state.touch_removed(&a);
        assert!(state.change_events().is_empty());
    }

    #[test]
    fn clear_keeps_status() {
        let mut state = SessionState::default();
        state.status = SessionStatus::Committed;
        state.changes.push(Change::DeleteLinks {
            entity: EntityKey::Saved(PersistentEntityId::new(0, 0)),
            name: "x".to_string(),
        });
        state.clear();
        assert!(!state.has_changes());
        assert_eq!(state.status, SessionStatus::Committed);
    }

    #[test]
    fn apply_resolves_new_entities() {
        use transidb_storage::{InMemoryStore, PersistentStore};

        let store = InMemoryStore::new();
        let parent = TransientId::new();
        let child = TransientId::new();
        let changes = vec![
            Change::NewEntity {
                id: parent,
                entity_type: "Folder".to_string(),
            },
            Change::NewEntity {
                id: child,
                entity_type: "File".to_string(),
            },
            Change::AddLink {
                entity: EntityKey::New(parent),
                name: "files".to_string(),
                target: EntityKey::New(child),
            },
        ];

        let mut ids = HashMap::new();
        let mut txn = store.begin_transaction().unwrap();
        for change in &changes {
            change.apply(txn.as_mut(), &mut ids).unwrap();
        }
        txn.commit().unwrap();

        assert_eq!(
            store.get_links(ids[&parent], "files").unwrap(),
            vec![ids[&child]]
        );
    }

    #[test]
    fn set_link_replaces_the_stored_target() {
        use transidb_storage::{InMemoryStore, PersistentStore};

        let store = InMemoryStore::new();
        let mut txn = store.begin_transaction().unwrap();
        let file = txn.new_entity("File").unwrap();
        let first = txn.new_entity("Folder").unwrap();
        let second = txn.new_entity("Folder").unwrap();
        txn.add_link(file, "folder", first).unwrap();

        let change = Change::SetLink {
            entity: EntityKey::Saved(file),
            name: "folder".to_string(),
            target: EntityKey::Saved(second),
        };
        change.apply(txn.as_mut(), &mut HashMap::new()).unwrap();
        txn.commit().unwrap();

        assert_eq!(store.get_link(file, "folder").unwrap(), Some(second));
        assert_eq!(store.get_links(file, "folder").unwrap(), vec![second]);
    }

    #[test]
    fn apply_rejects_unknown_new_entity() {
        use transidb_storage::{InMemoryStore, PersistentStore};

        let store = InMemoryStore::new();
        let change = Change::DeleteEntity {
            entity: EntityKey::New(TransientId::new()),
        };
        let mut txn = store.begin_transaction().unwrap();
        let result = change.apply(txn.as_mut(), &mut HashMap::new());
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }
}
