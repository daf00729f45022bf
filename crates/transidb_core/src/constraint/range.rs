//! Numeric bounds.

use super::{render, PropertyConstraint};
use transidb_storage::PropertyValue;

/// Bounds numeric values from below, above, or both.
#[derive(Debug, Clone)]
pub struct InRangeConstraint {
    min: Option<i64>,
    max: Option<i64>,
    min_message: String,
    max_message: String,
}

impl InRangeConstraint {
    /// Creates a lower bound.
    #[must_use]
    pub fn min(min: i64, message: Option<&str>) -> Self {
        Self {
            min: Some(min),
            max: None,
            min_message: message.map_or_else(|| format!("should be at least {min}"), str::to_string),
            max_message: String::new(),
        }
    }

    /// Creates an upper bound.
    #[must_use]
    pub fn max(max: i64, message: Option<&str>) -> Self {
        Self {
            min: None,
            max: Some(max),
            min_message: String::new(),
            max_message: message.map_or_else(|| format!("should be at most {max}"), str::to_string),
        }
    }

    fn below_min(&self, value: &PropertyValue) -> bool {
        self.min.is_some_and(|min| match value {
            PropertyValue::Integer(n) => *n < min,
            PropertyValue::Float(x) => *x < min as f64,
            _ => false,
        })
    }

    fn above_max(&self, value: &PropertyValue) -> bool {
        self.max.is_some_and(|max| match value {
            PropertyValue::Integer(n) => *n > max,
            PropertyValue::Float(x) => *x > max as f64,
            _ => false,
        })
    }
}

impl PropertyConstraint for InRangeConstraint {
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool {
        match value {
            None => true,
            Some(v) => v.as_f64().is_some() && !self.below_min(v) && !self.above_max(v),
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
        match value {
            Some(v) if self.above_max(v) => self.max_message.clone(),
            _ if self.min.is_some() => self.min_message.clone(),
            _ => self.max_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_bound() {
        let c = InRangeConstraint::min(18, None);
        assert!(c.is_valid(Some(&PropertyValue::from(18))));
        assert!(!c.is_valid(Some(&PropertyValue::from(17))));
        assert!(!c.is_valid(Some(&PropertyValue::from(17.5))));
        assert_eq!(
            c.exception_message("age", Some(&PropertyValue::from(3))),
            "age should be at least 18 but was 3"
        );
    }

    #[test]
    fn max_bound() {
        let c = InRangeConstraint::max(10, Some("too many"));
        assert!(c.is_valid(Some(&PropertyValue::from(10))));
        assert!(!c.is_valid(Some(&PropertyValue::from(11))));
        assert_eq!(c.display_message("n", Some(&PropertyValue::from(11))), "too many");
    }

    #[test]
    fn integers_compare_exactly_near_the_edges() {
        let c = InRangeConstraint::max(1 << 53, None);
        assert!(c.is_valid(Some(&PropertyValue::from(1_i64 << 53))));
        assert!(!c.is_valid(Some(&PropertyValue::from((1_i64 << 53) + 1))));

        let c = InRangeConstraint::min(i64::MAX, None);
        assert!(c.is_valid(Some(&PropertyValue::from(i64::MAX))));
        assert!(!c.is_valid(Some(&PropertyValue::from(i64::MAX - 1))));

        let c = InRangeConstraint::max(i64::MIN, None);
        assert!(!c.is_valid(Some(&PropertyValue::from(i64::MIN + 1))));
    }

    #[test]
    fn non_numeric_fails() {
        let c = InRangeConstraint::min(0, None);
        assert!(!c.is_valid(Some(&PropertyValue::from("5"))));
    }
}
