//! Transient store configuration.

/// Configuration for a [`TransientEntityStore`](crate::TransientEntityStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether sessions capture a backtrace when they are created.
    ///
    /// Backtraces are reported for sessions still open when the store
    /// closes, if debug logging is enabled.
    pub track_session_creation: bool,

    /// Explicit setting for the persistent store's downgrade-after-flush
    /// optimization. `None` disables it.
    pub txn_downgrade_after_flush: Option<bool>,

    /// Expected number of concurrently live sessions.
    pub expected_sessions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            track_session_creation: false,
            txn_downgrade_after_flush: None,
            expected_sessions: 16,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether session creation backtraces are captured.
    #[must_use]
    pub const fn track_session_creation(mut self, value: bool) -> Self {
        self.track_session_creation = value;
        self
    }

    /// Sets the downgrade-after-flush optimization explicitly.
    #[must_use]
    pub const fn txn_downgrade_after_flush(mut self, value: bool) -> Self {
        self.txn_downgrade_after_flush = Some(value);
        self
    }

    /// Sets the expected number of live sessions.
    #[must_use]
    pub const fn expected_sessions(mut self, count: usize) -> Self {
        self.expected_sessions = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(!config.track_session_creation);
        assert_eq!(config.txn_downgrade_after_flush, None);
        assert_eq!(config.expected_sessions, 16);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .track_session_creation(true)
            .txn_downgrade_after_flush(true)
            .expected_sessions(4);

        assert!(config.track_session_creation);
        assert_eq!(config.txn_downgrade_after_flush, Some(true));
        assert_eq!(config.expected_sessions, 4);
    }
}
