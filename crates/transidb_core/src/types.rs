//! Core type definitions for TransiDB.

use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transient session.
///
/// Session IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Creates a new session ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Session-local identity of an entity that has not been flushed yet.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransientId(Uuid);

impl TransientId {
    /// Creates a new random transient ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn to_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for TransientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransientId({})", self.0)
    }
}

impl fmt::Display for TransientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "new:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display() {
        assert_eq!(SessionId::new(42).to_string(), "session:42");
    }

    #[test]
    fn session_id_ordering() {
        assert!(SessionId::new(1) < SessionId::new(2));
    }

    #[test]
    fn transient_ids_are_unique() {
        assert_ne!(TransientId::new(), TransientId::new());
    }
}
