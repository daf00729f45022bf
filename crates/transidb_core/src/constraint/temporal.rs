//! Past and future checks for timestamps.

use super::{render, PropertyConstraint};
use chrono::{DateTime, Utc};
use transidb_storage::PropertyValue;

/// Which side of "now" a timestamp must lie on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalDirection {
    /// Strictly before now.
    Past,
    /// Strictly after now.
    Future,
}

/// Checks a timestamp against the current time.
///
/// Accepts date-time values and integers holding milliseconds since the
/// Unix epoch.
#[derive(Debug, Clone)]
pub struct TemporalConstraint {
    direction: TemporalDirection,
    message: String,
}

impl TemporalConstraint {
    /// Creates the constraint.
    #[must_use]
    pub fn new(direction: TemporalDirection, message: Option<&str>) -> Self {
        let default = match direction {
            TemporalDirection::Past => "should be in the past",
            TemporalDirection::Future => "should be in the future",
        };
        Self {
            direction,
            message: message.unwrap_or(default).to_string(),
        }
    }

    fn timestamp(value: &PropertyValue) -> Option<DateTime<Utc>> {
        match value {
            PropertyValue::DateTime(t) => Some(*t),
            PropertyValue::Integer(millis) => DateTime::from_timestamp_millis(*millis),
            _ => None,
        }
    }
}

impl PropertyConstraint for TemporalConstraint {
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool {
        let Some(value) = value else {
            return true;
        };
        let now = Utc::now();
        Self::timestamp(value).is_some_and(|t| match self.direction {
            TemporalDirection::Past => t < now,
            TemporalDirection::Future => t > now,
        })
    }

    fn exception_message(&self, property: &str, value: Option<&PropertyValue>) -> String {
        format!("{property} {} but was {}", self.message, render(value))
    }

    fn display_message(&self, _property: &str, _value: Option<&PropertyValue>) -> String {
        self.message.clone()
    }
}
