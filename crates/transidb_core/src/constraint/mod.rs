//! Property constraints.
//!
//! A constraint is a predicate over one property value plus two message
//! hooks: an exception message naming the property and the offending value,
//! and a short message suitable for display next to the field.
//!
//! Constraints are checked when a session flushes. All constraints of a
//! property are evaluated, in registration order. Absent values pass every
//! built-in constraint except [`require_if`](PropertyConstraints::require_if).
//!
//! # Example
//!
//! ```rust
//! use transidb_core::PropertyConstraints;
//! use transidb_storage::PropertyValue;
//!
//! let constraints = PropertyConstraints::new()
//!     .alpha_numeric(None)
//!     .length(3, 16, Some("login must be 3 to 16 characters"));
//!
//! let ok = PropertyValue::from("alice");
//! assert!(constraints.first_failure(Some(&ok)).is_none());
//!
//! let bad = PropertyValue::from("a!");
//! let failed = constraints.first_failure(Some(&bad)).unwrap();
//! assert_eq!(failed.display_message("login", Some(&bad)), "should contain only letters and digits");
//! ```

mod conditional;
mod length;
mod range;
mod temporal;
mod text;

pub use conditional::RequireIfConstraint;
pub use length::LengthConstraint;
pub use range::InRangeConstraint;
pub use temporal::{TemporalConstraint, TemporalDirection};
pub use text::{ContainsNoneConstraint, RegexConstraint, UriConstraint, UrlConstraint};

use crate::entity::TransientEntity;
use crate::error::CoreResult;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use transidb_storage::PropertyValue;

/// A validation rule for a single property value.
///
/// Implementations must be stateless once built; one instance is shared by
/// every entity of the owning type.
pub trait PropertyConstraint: Send + Sync {
    /// Returns `true` if the value satisfies the constraint.
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool;

    /// Renders a message naming the property and the offending value.
    fn exception_message(&self, property: &str, value: Option<&PropertyValue>) -> String;

    /// Renders a short message for display next to the property.
    fn display_message(&self, property: &str, value: Option<&PropertyValue>) -> String;
}

/// A failed check found while validating a session's changes.
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    /// The offending entity.
    pub entity: TransientEntity,
    /// The offending property or link.
    pub property: String,
    /// Message naming the property and value.
    pub message: String,
    /// Message for display.
    pub display_message: String,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.message)
    }
}

pub(crate) fn render(value: Option<&PropertyValue>) -> String {
    value.map_or_else(|| "null".to_string(), ToString::to_string)
}

/// The ordered constraints of one property.
#[derive(Clone, Default)]
pub struct PropertyConstraints {
    constraints: Vec<Arc<dyn PropertyConstraint>>,
}

impl PropertyConstraints {
    /// Creates an empty constraint list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom constraint.
    #[must_use]
    pub fn with(mut self, constraint: impl PropertyConstraint + 'static) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    /// Requires string values to match a regular expression.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstraint` if the pattern does not compile.
    pub fn regex(self, pattern: &str, message: Option<&str>) -> CoreResult<Self> {
        Ok(self.with(RegexConstraint::new(pattern, message)?))
    }

    /// Requires string values to be email addresses.
    ///
    /// `pattern` replaces the built-in address syntax.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstraint` if the pattern does not compile.
    pub fn email(self, pattern: Option<&str>, message: Option<&str>) -> CoreResult<Self> {
        Ok(self.with(RegexConstraint::email(pattern, message)?))
    }

    /// Forbids any of `chars` in string values.
    #[must_use]
    pub fn contains_none(self, chars: &str, message: Option<&str>) -> Self {
        self.with(ContainsNoneConstraint::new(chars, message))
    }

    /// Requires string values to contain only letters.
    #[must_use]
    pub fn alpha(self, message: Option<&str>) -> Self {
        self.with(RegexConstraint::alpha(message))
    }

    /// Requires string values to contain only digits.
    #[must_use]
    pub fn numeric(self, message: Option<&str>) -> Self {
        self.with(RegexConstraint::numeric(message))
    }

    /// Requires string values to contain only letters and digits.
    #[must_use]
    pub fn alpha_numeric(self, message: Option<&str>) -> Self {
        self.with(RegexConstraint::alpha_numeric(message))
    }

    /// Requires string values to be absolute URLs.
    #[must_use]
    pub fn url(self, message: Option<&str>) -> Self {
        self.with(UrlConstraint::new(message))
    }

    /// Requires string values to be URI references.
    #[must_use]
    pub fn uri(self, message: Option<&str>) -> Self {
        self.with(UriConstraint::new(message))
    }

    /// Bounds the character count of string values.
    ///
    /// A `min` of 0 or a `max` of `usize::MAX` leaves that side open. The
    /// custom message replaces the range, minimum or maximum message,
    /// depending on which bounds are set.
    #[must_use]
    pub fn length(self, min: usize, max: usize, message: Option<&str>) -> Self {
        self.with(LengthConstraint::new(min, max, message))
    }

    /// Requires numeric values to be at least `min`.
    #[must_use]
    pub fn min(self, min: i64, message: Option<&str>) -> Self {
        self.with(InRangeConstraint::min(min, message))
    }

    /// Requires numeric values to be at most `max`.
    #[must_use]
    pub fn max(self, max: i64, message: Option<&str>) -> Self {
        self.with(InRangeConstraint::max(max, message))
    }

    /// Requires a value whenever `predicate` holds.
    #[must_use]
    pub fn require_if(
        self,
        message: Option<&str>,
        predicate: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.with(RequireIfConstraint::new(message, predicate))
    }

    /// Requires timestamps to lie in the past.
    #[must_use]
    pub fn past(self, message: Option<&str>) -> Self {
        self.with(TemporalConstraint::new(TemporalDirection::Past, message))
    }

    /// Requires timestamps to lie in the future.
    #[must_use]
    pub fn future(self, message: Option<&str>) -> Self {
        self.with(TemporalConstraint::new(TemporalDirection::Future, message))
    }

    /// Returns the number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns `true` if there are no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Iterates the constraints in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn PropertyConstraint> {
        self.constraints.iter().map(|c| {
            let c: &dyn PropertyConstraint = c.as_ref();
            c
        })
    }

    /// Evaluates every constraint and returns the failing ones, in
    /// registration order.
    pub fn failures(&self, value: Option<&PropertyValue>) -> Vec<&dyn PropertyConstraint> {
        self.iter().filter(|c| !c.is_valid(value)).collect()
    }

    /// Returns the first failing constraint in registration order.
    pub fn first_failure(&self, value: Option<&PropertyValue>) -> Option<&dyn PropertyConstraint> {
        self.failures(value).into_iter().next()
    }
}

impl fmt::Debug for PropertyConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyConstraints")
            .field("count", &self.constraints.len())
            .finish()
    }
}

pub(crate) fn compile(pattern: &str) -> CoreResult<Regex> {
    Regex::new(pattern).map_err(|e| crate::error::CoreError::invalid_constraint(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn all_failures_in_registration_order() {
        let constraints = PropertyConstraints::new()
            .numeric(Some("digits only"))
            .length(5, usize::MAX, Some("too short"))
            .contains_none("x", Some("no x"));

        let value = PropertyValue::from("ax");
        let messages: Vec<_> = constraints
            .failures(Some(&value))
            .iter()
            .map(|c| c.display_message("code", Some(&value)))
            .collect();
        assert_eq!(messages, vec!["digits only", "too short", "no x"]);
    }

    #[test]
    fn absent_value_passes_plain_constraints() {
        let constraints = PropertyConstraints::new()
            .alpha(None)
            .length(2, 4, None)
            .min(3, None)
            .url(None)
            .past(None);
        assert!(constraints.first_failure(None).is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let result = PropertyConstraints::new().regex("(", None);
        assert!(matches!(
            result,
            Err(crate::error::CoreError::InvalidConstraint { .. })
        ));
    }

    proptest! {
        #[test]
        fn first_failure_is_deterministic(s in "[a-z0-9!]{0,12}") {
            let constraints = PropertyConstraints::new()
                .alpha(None)
                .numeric(None)
                .length(3, 8, None);
            let value = PropertyValue::from(s.as_str());
            let first = constraints
                .first_failure(Some(&value))
                .map(|c| c.exception_message("p", Some(&value)));
            let again = constraints
                .first_failure(Some(&value))
                .map(|c| c.exception_message("p", Some(&value)));
            prop_assert_eq!(first, again);
        }

        #[test]
        fn alpha_numeric_accepts_exactly_letters_and_digits(s in "\\PC{0,10}") {
            let constraints = PropertyConstraints::new().alpha_numeric(None);
            let value = PropertyValue::from(s.as_str());
            let expected = s.chars().all(|c| c.is_ascii_alphanumeric());
            prop_assert_eq!(constraints.first_failure(Some(&value)).is_none(), expected);
        }
    }
}
