//! Store statistics.
//!
//! Counters for session lifecycle and flush activity.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use transidb_core::{ModelRegistry, StoreConfig, TransientEntityStore};
//! use transidb_storage::InMemoryStore;
//!
//! let store = TransientEntityStore::new(
//!     Arc::new(InMemoryStore::new()),
//!     ModelRegistry::new(),
//!     StoreConfig::default(),
//! );
//! let session = store.begin_session().unwrap();
//! session.commit().unwrap();
//!
//! let stats = store.stats().snapshot();
//! assert_eq!(stats.sessions_begun, 1);
//! assert_eq!(stats.sessions_committed, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Store statistics.
///
/// All counters are atomic and can be read while sessions are in progress.
/// Values are monotonically increasing.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Total number of sessions created.
    sessions_begun: AtomicU64,
    /// Total number of sessions committed.
    sessions_committed: AtomicU64,
    /// Total number of sessions aborted.
    sessions_aborted: AtomicU64,
    /// Total number of flushes applied to the persistent store.
    flushes: AtomicU64,
    /// Total number of flushes rejected by validation.
    constraint_failures: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_session_begin(&self) {
        self.sessions_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_session_commit(&self) {
        self.sessions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_session_abort(&self) {
        self.sessions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_constraint_failure(&self) {
        self.constraint_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total number of sessions created.
    pub fn sessions_begun(&self) -> u64 {
        self.sessions_begun.load(Ordering::Relaxed)
    }

    /// Returns the total number of sessions committed.
    pub fn sessions_committed(&self) -> u64 {
        self.sessions_committed.load(Ordering::Relaxed)
    }

    /// Returns the total number of sessions aborted.
    pub fn sessions_aborted(&self) -> u64 {
        self.sessions_aborted.load(Ordering::Relaxed)
    }

    /// Returns the total number of applied flushes.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Returns the total number of flushes rejected by validation.
    pub fn constraint_failures(&self) -> u64 {
        self.constraint_failures.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions_begun: self.sessions_begun(),
            sessions_committed: self.sessions_committed(),
            sessions_aborted: self.sessions_aborted(),
            flushes: self.flushes(),
            constraint_failures: self.constraint_failures(),
        }
    }
}

/// A point-in-time snapshot of store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Total number of sessions created.
    pub sessions_begun: u64,
    /// Total number of sessions committed.
    pub sessions_committed: u64,
    /// Total number of sessions aborted.
    pub sessions_aborted: u64,
    /// Total number of applied flushes.
    pub flushes: u64,
    /// Total number of flushes rejected by validation.
    pub constraint_failures: u64,
}
