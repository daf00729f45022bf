//! # TransiDB Testkit
//!
//! Test utilities for TransiDB.
//!
//! This crate provides:
//! - An issue-tracker model and store helpers
//! - A listener that records its notifications
//! - Property-based test generators using proptest
//! - Concurrent session and flush-lock stress harnesses
//!
//! ## Usage
//!
//! ```rust
//! use transidb_testkit::prelude::*;
//!
//! let ts = TestStore::new();
//! let session = ts.begin_session().unwrap();
//! let project = create_project(&session, "core").unwrap();
//! create_issue(&session, &ts.links, &project, "first issue").unwrap();
//! session.commit().unwrap();
//! assert_eq!(ts.memory.entity_count(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
