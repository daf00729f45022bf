//! Identifier and value types shared with the persistent store.

use chrono::{DateTime, Utc};
use std::fmt;

/// Numeric identifier of an entity type.
///
/// Type ids are assigned when the first entity of a type is created and
/// survive type renames.
pub type EntityTypeId = i32;

/// Identifier of a stored entity.
///
/// A persistent id is the pair of the entity's type id and a local id that is
/// unique within that type. Local ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PersistentEntityId {
    type_id: EntityTypeId,
    local_id: u64,
}

impl PersistentEntityId {
    /// Creates a persistent id.
    #[must_use]
    pub const fn new(type_id: EntityTypeId, local_id: u64) -> Self {
        Self { type_id, local_id }
    }

    /// Returns the type id.
    #[must_use]
    pub const fn type_id(self) -> EntityTypeId {
        self.type_id
    }

    /// Returns the local id.
    #[must_use]
    pub const fn local_id(self) -> u64 {
        self.local_id
    }
}

impl fmt::Display for PersistentEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.type_id, self.local_id)
    }
}

/// A scalar property value.
///
/// The store owns how values are encoded; callers only see typed values.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// UTF-8 text.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean flag.
    Boolean(bool),
    /// Point in time.
    DateTime(DateTime<Utc>),
}

impl PropertyValue {
    /// Returns the text if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns a numeric view of integer and float values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the timestamp if this is a date-time value.
    #[must_use]
    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}
