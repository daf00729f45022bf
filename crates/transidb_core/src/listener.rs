//! Session listeners and their priority registry.
//!
//! Listeners observe session flushes. They are registered on the store with
//! a numeric priority: higher priorities fire first, and listeners with equal
//! priority fire in registration order.

use crate::change_feed::ChangeEvent;
use crate::constraint::ConstraintViolation;
use crate::session::TransientSession;
use crate::store::TransientEntityStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observer of session flushes.
///
/// Every hook has an empty default. Hooks run on the flushing thread with no
/// session lock held.
pub trait SessionListener: Send + Sync {
    /// Called before validation with the pending changes.
    fn before_flush(&self, session: &TransientSession, changes: &[ChangeEvent]) {
        let _ = (session, changes);
    }

    /// Called when validation rejected a flush.
    fn after_constraints_fail(&self, session: &TransientSession, violations: &[ConstraintViolation]) {
        let _ = (session, violations);
    }

    /// Called after the changes reached the persistent store.
    fn flushed(&self, session: &TransientSession, changes: &[ChangeEvent]) {
        let _ = (session, changes);
    }
}

/// Store-level event sink.
///
/// At most one multiplexer is attached to a store. It is told when the store
/// closes and receives every flushed change set after the listeners.
pub trait EventsMultiplexer: Send + Sync {
    /// Called when the store starts closing.
    fn on_close(&self, store: &TransientEntityStore);

    /// Called after a session flushed.
    fn flushed(&self, session: &TransientSession, changes: &[ChangeEvent]);
}

struct Entry {
    priority: i32,
    sequence: u64,
    listener: Arc<dyn SessionListener>,
}

/// Listeners ordered by descending priority, then registration order.
#[derive(Default)]
pub(crate) struct PriorityListeners {
    entries: RwLock<Vec<Entry>>,
    next_sequence: AtomicU64,
}

impl PriorityListeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, listener: Arc<dyn SessionListener>, priority: i32) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write();
        // Insert after every entry that sorts before (priority desc, sequence asc)
        let position = entries.partition_point(|e| {
            e.priority > priority || (e.priority == priority && e.sequence < sequence)
        });
        entries.insert(
            position,
            Entry {
                priority,
                sequence,
                listener,
            },
        );
    }

    pub(crate) fn remove(&self, listener: &Arc<dyn SessionListener>) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| !Arc::ptr_eq(&e.listener, listener));
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Runs `action` on a snapshot of the listeners, in firing order.
    ///
    /// Listeners may be added or removed while the snapshot is dispatched.
    pub(crate) fn for_each(&self, mut action: impl FnMut(&Arc<dyn SessionListener>)) {
        let snapshot: Vec<Arc<dyn SessionListener>> = self
            .entries
            .read()
            .iter()
            .map(|e| Arc::clone(&e.listener))
            .collect();
        for listener in &snapshot {
            action(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    struct Tagged;

    impl SessionListener for Tagged {}

    fn order(listeners: &PriorityListeners, tags: &[(Arc<dyn SessionListener>, usize)]) -> Vec<usize> {
        let mut seen = Vec::new();
        listeners.for_each(|l| {
            let found = tags
                .iter()
                .find(|(arc, _)| Arc::ptr_eq(arc, l))
                .map(|(_, tag)| *tag);
            seen.extend(found);
        });
        seen
    }

    #[test]
    fn priority_then_registration_order() {
        let listeners = PriorityListeners::new();
        let mut tags = Vec::new();
        for (tag, priority) in [5, 1, 5, 0].into_iter().enumerate() {
            let listener: Arc<dyn SessionListener> = Arc::new(Tagged);
            listeners.add(Arc::clone(&listener), priority);
            tags.push((listener, tag));
        }
        assert_eq!(order(&listeners, &tags), vec![0, 2, 1, 3]);
    }

    #[test]
    fn remove_by_identity() {
        let listeners = PriorityListeners::new();
        let a: Arc<dyn SessionListener> = Arc::new(Tagged);
        let b: Arc<dyn SessionListener> = Arc::new(Tagged);
        listeners.add(Arc::clone(&a), 0);
        listeners.add(Arc::clone(&b), 0);

        assert!(listeners.remove(&a));
        assert!(!listeners.remove(&a));
        assert_eq!(listeners.len(), 1);
        assert_eq!(order(&listeners, &[(b, 1)]), vec![1]);
    }

    #[test]
    fn dispatch_tolerates_registration() {
        let listeners = Arc::new(PriorityListeners::new());
        listeners.add(Arc::new(Tagged), 0);
        let calls = Mutex::new(0);
        listeners.for_each(|_| {
            listeners.add(Arc::new(Tagged), 0);
            *calls.lock() += 1;
        });
        assert_eq!(*calls.lock(), 1);
        assert_eq!(listeners.len(), 2);
    }

    proptest! {
        #[test]
        fn firing_order_is_stable_sort(priorities in proptest::collection::vec(-3i32..3, 0..20)) {
            let listeners = PriorityListeners::new();
            let mut tags = Vec::new();
            for (tag, priority) in priorities.iter().enumerate() {
                let listener: Arc<dyn SessionListener> = Arc::new(Tagged);
                listeners.add(Arc::clone(&listener), *priority);
                tags.push((listener, tag));
            }

            let mut expected: Vec<usize> = (0..priorities.len()).collect();
            expected.sort_by_key(|&i| std::cmp::Reverse(priorities[i]));
            prop_assert_eq!(order(&listeners, &tags), expected);
        }
    }
}
