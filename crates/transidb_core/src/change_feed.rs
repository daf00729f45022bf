//! Change events and the change feed.
//!
//! Each flush describes what it changed as a list of [`ChangeEvent`]s, one
//! per touched entity. Listeners receive them before and after the flush;
//! the attached [`EventsMultiplexer`] receives them once they are stored.
//!
//! [`ChangeFeed`] is a multiplexer that hands flushed change sets to
//! subscribers and keeps a bounded history for polling.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use transidb_core::{ChangeFeed, EntityTypeModel, ModelRegistry, StoreConfig, TransientEntityStore};
//! use transidb_storage::InMemoryStore;
//!
//! let model = ModelRegistry::new().with_type(EntityTypeModel::new("Note"));
//! let store = TransientEntityStore::new(Arc::new(InMemoryStore::new()), model, StoreConfig::default());
//! let feed = Arc::new(ChangeFeed::new());
//! store.set_events_multiplexer(Some(feed.clone()));
//!
//! let receiver = feed.subscribe();
//! let session = store.begin_session().unwrap();
//! session.new_entity("Note").unwrap();
//! session.commit().unwrap();
//!
//! let record = receiver.recv().unwrap();
//! assert_eq!(record.changes.len(), 1);
//! ```

use crate::entity::TransientEntity;
use crate::listener::EventsMultiplexer;
use crate::session::TransientSession;
use crate::store::TransientEntityStore;
use crate::types::SessionId;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Entity was created in the session.
    Insert,
    /// Properties or links of an existing entity changed.
    Update,
    /// Entity was deleted.
    Delete,
}

/// What one flush changed on one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The entity.
    pub entity: TransientEntity,
    /// Type of change.
    pub change_type: ChangeType,
    /// Properties that were written.
    pub properties: BTreeSet<String>,
    /// Links that were modified.
    pub links: BTreeSet<String>,
}

impl ChangeEvent {
    pub(crate) fn new(entity: TransientEntity, change_type: ChangeType) -> Self {
        Self {
            entity,
            change_type,
            properties: BTreeSet::new(),
            links: BTreeSet::new(),
        }
    }

    /// Returns `true` if the property was written.
    #[must_use]
    pub fn has_property_changed(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    /// Returns `true` if the link was modified.
    #[must_use]
    pub fn has_link_changed(&self, name: &str) -> bool {
        self.links.contains(name)
    }
}

/// The changes of one flush, as delivered by the [`ChangeFeed`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlushRecord {
    /// Position of the flush in the feed, starting at 1.
    pub sequence: u64,
    /// The session that flushed.
    pub session: SessionId,
    /// The flushed changes.
    pub changes: Vec<ChangeEvent>,
}

/// A change feed that distributes flushed changes to subscribers.
///
/// The change feed:
/// - Emits only flushed changes
/// - Numbers records in the order they reach the feed
/// - Supports multiple subscribers
/// - Disconnects subscribers when the store closes
///
/// Notifications run after the flush lock is released, so records of
/// concurrent flushes may arrive in a different order than the commits.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<FlushRecord>>>,
    history: RwLock<Vec<FlushRecord>>,
    max_history: usize,
    next_sequence: AtomicU64,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(1000)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Subscribes to the change feed.
    ///
    /// Returns a receiver that will receive all future flushes.
    pub fn subscribe(&self) -> Receiver<FlushRecord> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    fn emit(&self, session: SessionId, changes: Vec<ChangeEvent>) {
        // Numbering and delivery share the history lock
        let mut history = self.history.write();
        let record = FlushRecord {
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            session,
            changes,
        };
        history.push(record.clone());
        if history.len() > self.max_history {
            let to_remove = history.len() - self.max_history;
            history.drain(0..to_remove);
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(record.clone()).is_ok());
    }

    /// Returns flushes with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<FlushRecord> {
        let history = self.history.read();
        history
            .iter()
            .filter(|r| r.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map_or(0, |r| r.sequence)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventsMultiplexer for ChangeFeed {
    fn on_close(&self, _store: &TransientEntityStore) {
        // Dropping the senders ends every subscriber's iteration
        self.subscribers.write().clear();
    }

    fn flushed(&self, session: &TransientSession, changes: &[ChangeEvent]) {
        self.emit(session.id(), changes.to_vec());
    }
}
