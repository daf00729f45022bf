//! Text constraints.

use super::{compile, render, PropertyConstraint};
use crate::error::CoreResult;
use regex::Regex;
use std::sync::OnceLock;
use transidb_storage::PropertyValue;

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}";

fn alpha_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"^[A-Za-z]*$").expect("alpha regex must compile"))
}

fn numeric_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"^[0-9]*$").expect("numeric regex must compile"))
}

fn alpha_numeric_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"^[A-Za-z0-9]*$").expect("alphanumeric regex must compile"))
}

// RFC 3986 URI reference: optional scheme, then reserved/unreserved
// characters and percent escapes.
fn uri_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.\-]*:)?(?:[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=]|%[0-9A-Fa-f]{2})*$")
            .expect("uri regex must compile")
    })
}

/// Requires string values to match a whole-value pattern.
#[derive(Debug, Clone)]
pub struct RegexConstraint {
    regex: Regex,
    requirement: String,
    message: String,
}

impl RegexConstraint {
    /// Creates a constraint from a pattern.
    ///
    /// The pattern must match the whole value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstraint` if the pattern does not compile.
    pub fn new(pattern: &str, message: Option<&str>) -> CoreResult<Self> {
        let requirement = format!("match pattern {pattern}");
        Ok(Self::from_regex(
            compile(&format!("^(?:{pattern})$"))?,
            requirement,
            message,
        ))
    }

    /// Creates an email address constraint.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstraint` if a custom pattern does not compile.
    pub fn email(pattern: Option<&str>, message: Option<&str>) -> CoreResult<Self> {
        let pattern = pattern.unwrap_or(EMAIL_PATTERN);
        Ok(Self::from_regex(
            compile(&format!("^(?:{pattern})$"))?,
            "be a valid email address".to_string(),
            message,
        ))
    }

    /// Creates a letters-only constraint.
    #[must_use]
    pub fn alpha(message: Option<&str>) -> Self {
        Self::from_regex(
            alpha_regex().clone(),
            "contain only letters".to_string(),
            message,
        )
    }

    /// Creates a digits-only constraint.
    #[must_use]
    pub fn numeric(message: Option<&str>) -> Self {
        Self::from_regex(
            numeric_regex().clone(),
            "contain only digits".to_string(),
            message,
        )
    }

    /// Creates a letters-and-digits constraint.
    #[must_use]
    pub fn alpha_numeric(message: Option<&str>) -> Self {
        Self::from_regex(
            alpha_numeric_regex().clone(),
            "contain only letters and digits".to_string(),
            message,
        )
    }

    fn from_regex(regex: Regex, requirement: String, message: Option<&str>) -> Self {
        let message = message.map_or_else(|| format!("should {requirement}"), str::to_string);
        Self {
            regex,
            requirement,
            message,
        }
    }
}

impl PropertyConstraint for RegexConstraint {
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool {
        match value {
            None => true,
            Some(v) => v.as_str().is_some_and(|s| self.regex.is_match(s)),
        }
    }

    fn exception_message(&self, property: &str, value: Option<&PropertyValue>) -> String {
        format!(
            "{property} should {} but was {}",
            self.requirement,
            render(value)
        )
    }

    fn display_message(&self, _property: &str, _value: Option<&PropertyValue>) -> String {
        self.message.clone()
    }
}

/// Forbids a set of characters in string values.
#[derive(Debug, Clone)]
pub struct ContainsNoneConstraint {
    chars: String,
    message: String,
}

impl ContainsNoneConstraint {
    /// Creates the constraint.
    #[must_use]
    pub fn new(chars: &str, message: Option<&str>) -> Self {
        Self {
            chars: chars.to_string(),
            message: message.map_or_else(
                || format!("shouldn't contain characters {chars}"),
                str::to_string,
            ),
        }
    }
}

impl PropertyConstraint for ContainsNoneConstraint {
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool {
        match value {
            None => true,
            Some(v) => v
                .as_str()
                .is_some_and(|s| !s.chars().any(|c| self.chars.contains(c))),
        }
    }

    fn exception_message(&self, property: &str, value: Option<&PropertyValue>) -> String {
        format!(
            "{property} shouldn't contain characters {} but was {}",
            self.chars,
            render(value)
        )
    }

    fn display_message(&self, _property: &str, _value: Option<&PropertyValue>) -> String {
        self.message.clone()
    }
}

/// Requires string values to be absolute URLs.
#[derive(Debug, Clone)]
pub struct UrlConstraint {
    message: String,
}

impl UrlConstraint {
    /// Creates the constraint.
    #[must_use]
    pub fn new(message: Option<&str>) -> Self {
        Self {
            message: message.unwrap_or("is not a valid URL").to_string(),
        }
    }
}

impl PropertyConstraint for UrlConstraint {
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool {
        match value {
            None => true,
            Some(v) => v.as_str().is_some_and(|s| url::Url::parse(s).is_ok()),
        }
    }

    fn exception_message(&self, property: &str, value: Option<&PropertyValue>) -> String {
        format!("{property} should be valid URL but was {}", render(value))
    }

    fn display_message(&self, _property: &str, _value: Option<&PropertyValue>) -> String {
        self.message.clone()
    }
}

/// Requires string values to be URI references.
///
/// Relative references are accepted.
#[derive(Debug, Clone)]
pub struct UriConstraint {
    message: String,
}

impl UriConstraint {
    /// Creates the constraint.
    #[must_use]
    pub fn new(message: Option<&str>) -> Self {
        Self {
            message: message.unwrap_or("is not a valid URI").to_string(),
        }
    }
}

impl PropertyConstraint for UriConstraint {
    fn is_valid(&self, value: Option<&PropertyValue>) -> bool {
        match value {
            None => true,
            Some(v) => v.as_str().is_some_and(|s| uri_regex().is_match(s)),
        }
    }

    fn exception_message(&self, property: &str, value: Option<&PropertyValue>) -> String {
        format!("{property} should be valid URI but was {}", render(value))
    }

    fn display_message(&self, _property: &str, _value: Option<&PropertyValue>) -> String {
        self.message.clone()
    }
}
