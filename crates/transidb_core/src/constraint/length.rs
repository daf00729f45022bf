//! Length bounds for string values.

use super::{render, PropertyConstraint};
use transidb_storage::PropertyValue;

/// Bounds the number of characters of string values.
#[derive(Debug, Clone)]
pub struct LengthConstraint {
    min: usize,
    max: usize,
    min_message: String,
    max_message: String,
    range_message: String,
}

impl LengthConstraint {
    /// Creates the constraint.
    ///
    /// A `min` of 0 or a `max` of `usize::MAX` leaves that side open. A
    /// custom message goes to the range slot when both bounds are set, and to
    /// the minimum or maximum slot otherwise.
    #[must_use]
    pub fn new(min: usize, max: usize, message: Option<&str>) -> Self {
        let mut constraint = Self {
            min,
            max,
            min_message: format!("should be at least {min} characters long"),
            max_message: format!("should be at most {max} characters long"),
            range_message: format!("should be from {min} to {max} characters long"),
        };
        if let Some(message) = message {
            let slot = match (constraint.has_min(), constraint.has_max()) {
                (true, true) => Some(&mut constraint.range_message),
                (true, false) => Some(&mut constraint.min_message),
                (false, true) => Some(&mut constraint.max_message),
                (false, false) => None,
            };
            if let Some(slot) = slot {
                *slot = message.to_string();
            }
        }
        constraint
    }

    fn has_min(&self) -> bool {
        self.min > 0
    }

    fn has_max(&self) -> bool {
        self.max < usize::MAX
    }

    fn length(value: Option<&PropertyValue>) -> Option<usize> {
        value.and_then(PropertyValue::as_str).map(|s| s.chars().count())
    }
}

impl PropertyConstraint for LengthConstraint {
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool {
        match value {
            None => true,
            Some(_) => {
                Self::length(value).is_some_and(|len| len >= self.min && len <= self.max)
            }
        }
    }

    fn exception_message(&self, property: &str, value: Option<&PropertyValue>) -> String {
        format!(
            "{property} {} but was {}",
            self.display_message(property, value),
            render(value)
        )
    }

    fn display_message(&self, _property: &str, value: Option<&PropertyValue>) -> String {
        if self.has_min() && self.has_max() {
            return self.range_message.clone();
        }
        match Self::length(value) {
            Some(len) if len < self.min => self.min_message.clone(),
            _ if self.has_max() => self.max_message.clone(),
            _ => self.min_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> PropertyValue {
        PropertyValue::from(s)
    }

    #[test]
    fn counts_characters_not_bytes() {
        let c = LengthConstraint::new(0, 3, None);
        assert!(c.is_valid(Some(&text("äöü"))));
        assert!(!c.is_valid(Some(&text("äöüß"))));
    }

    #[test]
    fn bounds_are_inclusive() {
        let c = LengthConstraint::new(2, 4, None);
        assert!(!c.is_valid(Some(&text("a"))));
        assert!(c.is_valid(Some(&text("ab"))));
        assert!(c.is_valid(Some(&text("abcd"))));
        assert!(!c.is_valid(Some(&text("abcde"))));
    }

    #[test]
    fn message_slots() {
        let range = LengthConstraint::new(2, 4, Some("2..4"));
        assert_eq!(range.display_message("p", Some(&text("a"))), "2..4");

        let min = LengthConstraint::new(2, usize::MAX, Some("too short"));
        assert_eq!(min.display_message("p", Some(&text("a"))), "too short");

        let max = LengthConstraint::new(0, 4, Some("too long"));
        assert_eq!(max.display_message("p", Some(&text("abcdef"))), "too long");
    }

    #[test]
    fn default_messages() {
        let c = LengthConstraint::new(3, usize::MAX, None);
        assert_eq!(
            c.exception_message("login", Some(&text("ab"))),
            "login should be at least 3 characters long but was ab"
        );
    }
}
