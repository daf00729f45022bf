//! Environment configuration of a persistent store.

use std::time::Duration;

/// Store-wide transaction settings.
///
/// These are set once when a transient layer attaches to the store and are
/// not exposed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Whether a write transaction is downgraded to read-only after flush.
    pub txn_downgrade_after_flush: bool,

    /// How many times a conflicting transaction is replayed before failing.
    pub txn_replay_max_count: u32,

    /// How long a conflicting transaction keeps being replayed.
    pub txn_replay_timeout: Duration,

    /// Whether the garbage collector runs in exclusive transactions.
    pub gc_use_exclusive_transaction: bool,
}

impl EnvironmentConfig {
    /// Settings of a freshly opened store.
    pub const DEFAULT: Self = Self {
        txn_downgrade_after_flush: true,
        txn_replay_max_count: 2,
        txn_replay_timeout: Duration::from_secs(2),
        gc_use_exclusive_transaction: false,
    };

    /// Creates a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self::DEFAULT
    }

    /// Sets whether transactions are downgraded after flush.
    #[must_use]
    pub const fn txn_downgrade_after_flush(mut self, value: bool) -> Self {
        self.txn_downgrade_after_flush = value;
        self
    }

    /// Sets the maximum replay count.
    #[must_use]
    pub const fn txn_replay_max_count(mut self, count: u32) -> Self {
        self.txn_replay_max_count = count;
        self
    }

    /// Sets the replay timeout.
    #[must_use]
    pub const fn txn_replay_timeout(mut self, timeout: Duration) -> Self {
        self.txn_replay_timeout = timeout;
        self
    }

    /// Sets whether GC uses exclusive transactions.
    #[must_use]
    pub const fn gc_use_exclusive_transaction(mut self, value: bool) -> Self {
        self.gc_use_exclusive_transaction = value;
        self
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
