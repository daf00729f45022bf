//! Conditionally required values.

use super::PropertyConstraint;
use std::fmt;
use std::sync::Arc;
use transidb_storage::PropertyValue;

/// Requires a value whenever a predicate holds.
///
/// This is the only built-in constraint that rejects absent values.
#[derive(Clone)]
pub struct RequireIfConstraint {
    message: Option<String>,
    predicate: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl RequireIfConstraint {
    /// Creates the constraint.
    pub fn new(message: Option<&str>, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            message: message.map(str::to_string),
            predicate: Arc::new(predicate),
        }
    }
}

impl PropertyConstraint for RequireIfConstraint {
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool {
        !(self.predicate)() || value.is_some()
    }

    fn exception_message(&self, property: &str, _value: Option<&PropertyValue>) -> String {
        format!("Value for {property} is required")
    }

    fn display_message(&self, _property: &str, _value: Option<&PropertyValue>) -> String {
        self.message.clone().unwrap_or_else(|| "required".to_string())
    }
}

impl fmt::Debug for RequireIfConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequireIfConstraint")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn follows_predicate() {
        let flag = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&flag);
        let c = RequireIfConstraint::new(None, move || probe.load(Ordering::SeqCst));

        assert!(c.is_valid(None));

        flag.store(true, Ordering::SeqCst);
        assert!(!c.is_valid(None));
        assert!(c.is_valid(Some(&PropertyValue::from("x"))));
    }

    #[test]
    fn messages() {
        let c = RequireIfConstraint::new(None, || true);
        assert_eq!(c.exception_message("reason", None), "Value for reason is required");
        assert_eq!(c.display_message("reason", None), "required");

        let c = RequireIfConstraint::new(Some("give a reason"), || true);
        assert_eq!(c.display_message("reason", None), "give a reason");
    }
}
