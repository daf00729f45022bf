//! # TransiDB Core
//!
//! Transient session layer for TransiDB.
//!
//! This crate provides:
//! - The store coordinator: session registration, per-thread binding,
//!   suspend and resume, fair flush serialization
//! - Transient sessions that buffer entity changes and flush them in one
//!   persistent transaction
//! - Association link delegates with on-delete policies
//! - Property constraints validated at flush
//! - Prioritized session listeners and a change feed
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use transidb_core::{
//!     EntityTypeModel, LinkDelegate, ModelRegistry, PropertyModel, StoreConfig,
//!     TransientEntityStore,
//! };
//! use transidb_storage::{InMemoryStore, PropertyValue};
//!
//! let issues = LinkDelegate::parent_to_children("issues", "Issue", "project");
//! let project = LinkDelegate::child_to_parent("project", "Project", "issues");
//! let model = ModelRegistry::new()
//!     .with_type(
//!         EntityTypeModel::new("Project")
//!             .property(PropertyModel::new("name").required())
//!             .link(issues.clone()),
//!     )
//!     .with_type(EntityTypeModel::new("Issue").link(project.clone()));
//! let store = TransientEntityStore::new(Arc::new(InMemoryStore::new()), model, StoreConfig::default());
//!
//! store
//!     .transactional(false, |session| {
//!         let p = session.new_entity("Project")?;
//!         session.set_property(&p, "name", Some(PropertyValue::from("core")))?;
//!         let issue = session.new_entity("Issue")?;
//!         project.set_one(session, &issue, Some(&p))?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let session = store.begin_readonly_transaction().unwrap();
//! let projects = session.entities("Project").unwrap();
//! assert_eq!(issues.get_many(&session, &projects[0]).unwrap().len(), 1);
//! session.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
pub mod constraint;
mod entity;
mod error;
mod link;
mod listener;
mod model;
mod session;
mod stats;
mod store;
mod types;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType, FlushRecord};
pub use config::StoreConfig;
pub use constraint::{ConstraintViolation, PropertyConstraint, PropertyConstraints};
pub use entity::{AnyEntity, EntityKey, TransientEntity};
pub use error::{CoreError, CoreResult};
pub use link::{
    AssociationEndCardinality, AssociationEndType, LinkDelegate, LinkSpec, OnDeletePolicy,
};
pub use listener::{EventsMultiplexer, SessionListener};
pub use model::{EntityTypeModel, ModelRegistry, PropertyModel};
pub use session::{SessionStatus, TransientSession};
pub use stats::{StatsSnapshot, StoreStats};
pub use store::{CachedInstance, TransientEntityStore};
pub use types::{SessionId, TransientId};
