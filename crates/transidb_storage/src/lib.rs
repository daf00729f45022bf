//! # TransiDB Storage
//!
//! The persistent entity store contract consumed by TransiDB.
//!
//! TransiDB never owns durability or the on-disk format. Everything it needs
//! from the underlying store goes through two narrow traits:
//!
//! - [`PersistentStore`] - read access, entity type lookup, environment
//!   configuration, and starting write transactions
//! - [`PersistentTransaction`] - a single-writer unit of mutation that is
//!   applied atomically on [`PersistentTransaction::commit`]
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and embedding without durability
//!
//! ## Example
//!
//! ```rust
//! use transidb_storage::{InMemoryStore, PersistentStore, PropertyValue};
//!
//! let store = InMemoryStore::new();
//! let mut txn = store.begin_transaction().unwrap();
//! let id = txn.new_entity("User").unwrap();
//! txn.set_property(id, "login", PropertyValue::from("alice")).unwrap();
//! txn.commit().unwrap();
//!
//! assert!(store.entity_type_id("User").is_ok());
//! assert_eq!(
//!     store.get_property(id, "login").unwrap(),
//!     Some(PropertyValue::from("alice"))
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod memory;
mod store;
mod types;

pub use config::EnvironmentConfig;
pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use store::{PersistentStore, PersistentTransaction};
pub use types::{EntityTypeId, PersistentEntityId, PropertyValue};
