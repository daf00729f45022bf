//! Association link delegates.
//!
//! A [`LinkDelegate`] is the accessor of one declared association property.
//! It is built once per property, registered in the owning type's
//! [`EntityTypeModel`](crate::EntityTypeModel) and reused for every entity of
//! that type. Each variant fixes how the association is navigated and kept
//! consistent on both ends:
//!
//! | Variant | Cardinality | End | on delete | on target delete |
//! |---------|-------------|-----|-----------|------------------|
//! | `ChildToParent` | `1` | child | clear | cascade |
//! | `ManyToOneOptional` | `0..1` | undirected | explicit | explicit |
//! | `ParentToChildren` | `0..N` | parent | cascade | clear |
//! | `OneToMany` | `0..N` | undirected | explicit | explicit |
//!
//! Every accessor re-attaches the subject and the target to the session it
//! is given before touching link state.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use transidb_core::{EntityTypeModel, LinkDelegate, ModelRegistry, StoreConfig, TransientEntityStore};
//! use transidb_storage::InMemoryStore;
//!
//! let subtasks = LinkDelegate::parent_to_children("subtasks", "Task", "parent");
//! let parent = LinkDelegate::child_to_parent("parent", "Project", "subtasks");
//! let model = ModelRegistry::new()
//!     .with_type(EntityTypeModel::new("Project").link(subtasks.clone()))
//!     .with_type(EntityTypeModel::new("Task").link(parent.clone()));
//! let store = TransientEntityStore::new(Arc::new(InMemoryStore::new()), model, StoreConfig::default());
//!
//! let session = store.begin_session().unwrap();
//! let project = session.new_entity("Project").unwrap();
//! let task = session.new_entity("Task").unwrap();
//! parent.set_one(&session, &task, Some(&project)).unwrap();
//!
//! assert_eq!(subtasks.get_many(&session, &project).unwrap(), vec![task]);
//! session.commit().unwrap();
//! ```

use crate::entity::TransientEntity;
use crate::error::{CoreError, CoreResult};
use crate::model::ModelRegistry;
use crate::session::TransientSession;

/// How many targets an association end holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationEndCardinality {
    /// `0..1`
    ZeroOrOne,
    /// `1`
    One,
    /// `0..N`
    ZeroOrMore,
    /// `1..N`
    OneOrMore,
}

impl AssociationEndCardinality {
    /// Returns `true` if at least one target is required.
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, Self::One | Self::OneOrMore)
    }

    /// Returns `true` if the end holds many targets.
    #[must_use]
    pub const fn is_multiple(self) -> bool {
        matches!(self, Self::ZeroOrMore | Self::OneOrMore)
    }
}

/// Role of an association end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationEndType {
    /// The aggregating side of a parent/child association.
    Parent,
    /// The aggregated side of a parent/child association.
    Child,
    /// Either side of a plain bidirectional association.
    Undirected,
    /// A one-way association.
    Directed,
}

/// What happens at one end when the entity at the other end is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDeletePolicy {
    /// Refuse the deletion while the link exists.
    Fail,
    /// Drop the link.
    Clear,
    /// Delete the linked entities too.
    Cascade,
}

/// Declaration of one association property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    /// Property name on the owning type.
    pub property: String,
    /// Name the link is stored under, if it differs from `property`.
    pub db_property_name: Option<String>,
    /// Type at the other end.
    pub opposite_type: String,
    /// Property at the other end that points back.
    pub opposite_property: String,
    /// Cardinality of this end.
    pub cardinality: AssociationEndCardinality,
    /// Role of this end.
    pub end_type: AssociationEndType,
    /// Applied to the targets when the owner is deleted.
    pub on_delete: OnDeletePolicy,
    /// Applied to the owner when a target is deleted.
    pub on_target_delete: OnDeletePolicy,
}

impl LinkSpec {
    /// Returns the name the link is stored under.
    #[must_use]
    pub fn db_property_name(&self) -> &str {
        self.db_property_name.as_deref().unwrap_or(&self.property)
    }
}

/// Accessor of one association property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDelegate {
    /// Required reference from a child to its parent.
    ChildToParent(LinkSpec),
    /// Optional reference on the many side of a one-to-many association.
    ManyToOneOptional(LinkSpec),
    /// Collection of children on the parent side.
    ParentToChildren(LinkSpec),
    /// Collection on the one side of a one-to-many association.
    OneToMany(LinkSpec),
}

fn spec(
    property: &str,
    opposite_type: &str,
    opposite_property: &str,
    cardinality: AssociationEndCardinality,
    end_type: AssociationEndType,
    on_delete: OnDeletePolicy,
    on_target_delete: OnDeletePolicy,
) -> LinkSpec {
    LinkSpec {
        property: property.to_string(),
        db_property_name: None,
        opposite_type: opposite_type.to_string(),
        opposite_property: opposite_property.to_string(),
        cardinality,
        end_type,
        on_delete,
        on_target_delete,
    }
}

impl LinkDelegate {
    /// Declares a required child-to-parent reference.
    ///
    /// Deleting the child clears the reference; deleting the parent deletes
    /// the child.
    #[must_use]
    pub fn child_to_parent(property: &str, parent_type: &str, children_property: &str) -> Self {
        Self::ChildToParent(spec(
            property,
            parent_type,
            children_property,
            AssociationEndCardinality::One,
            AssociationEndType::Child,
            OnDeletePolicy::Clear,
            OnDeletePolicy::Cascade,
        ))
    }

    /// Declares an optional many-to-one reference.
    #[must_use]
    pub fn many_to_one_optional(
        property: &str,
        one_type: &str,
        one_to_many_property: &str,
        on_delete: OnDeletePolicy,
        on_target_delete: OnDeletePolicy,
    ) -> Self {
        Self::ManyToOneOptional(spec(
            property,
            one_type,
            one_to_many_property,
            AssociationEndCardinality::ZeroOrOne,
            AssociationEndType::Undirected,
            on_delete,
            on_target_delete,
        ))
    }

    /// Declares a collection of children.
    ///
    /// Deleting the parent deletes the children; deleting a child removes it
    /// from the collection.
    #[must_use]
    pub fn parent_to_children(property: &str, child_type: &str, parent_property: &str) -> Self {
        Self::ParentToChildren(spec(
            property,
            child_type,
            parent_property,
            AssociationEndCardinality::ZeroOrMore,
            AssociationEndType::Parent,
            OnDeletePolicy::Cascade,
            OnDeletePolicy::Clear,
        ))
    }

    /// Declares the collection side of a one-to-many association.
    #[must_use]
    pub fn one_to_many(
        property: &str,
        many_type: &str,
        many_to_one_property: &str,
        on_delete: OnDeletePolicy,
        on_target_delete: OnDeletePolicy,
    ) -> Self {
        Self::OneToMany(spec(
            property,
            many_type,
            many_to_one_property,
            AssociationEndCardinality::ZeroOrMore,
            AssociationEndType::Undirected,
            on_delete,
            on_target_delete,
        ))
    }

    /// Stores the link under a different name than the property.
    #[must_use]
    pub fn with_db_property_name(mut self, name: &str) -> Self {
        self.spec_mut().db_property_name = Some(name.to_string());
        self
    }

    /// Returns the declaration.
    #[must_use]
    pub fn spec(&self) -> &LinkSpec {
        match self {
            Self::ChildToParent(spec)
            | Self::ManyToOneOptional(spec)
            | Self::ParentToChildren(spec)
            | Self::OneToMany(spec) => spec,
        }
    }

    fn spec_mut(&mut self) -> &mut LinkSpec {
        match self {
            Self::ChildToParent(spec)
            | Self::ManyToOneOptional(spec)
            | Self::ParentToChildren(spec)
            | Self::OneToMany(spec) => spec,
        }
    }

    /// Returns the property name.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.spec().property
    }

    fn db_name(&self) -> &str {
        self.spec().db_property_name()
    }

    /// Returns the name under which the targets store the back reference.
    pub(crate) fn opposite_db_name<'a>(&'a self, model: &'a ModelRegistry) -> &'a str {
        let spec = self.spec();
        model
            .get(&spec.opposite_type)
            .and_then(|owner| owner.find_link(&spec.opposite_property))
            .map_or(spec.opposite_property.as_str(), |link| {
                link.spec().db_property_name()
            })
    }

    fn opposite<'a>(&'a self, session: &'a TransientSession) -> &'a str {
        self.opposite_db_name(session.store().model())
    }

    fn wrong_arity(&self, accessor: &str) -> CoreError {
        CoreError::invalid_operation(format!(
            "{accessor} is not supported by {} link {}",
            if self.spec().cardinality.is_multiple() {
                "to-many"
            } else {
                "to-one"
            },
            self.property()
        ))
    }

    /// Reads a to-one link.
    ///
    /// # Errors
    ///
    /// A `ChildToParent` link without a value fails with
    /// `RequiredPropertyUndefined`. To-many links fail with
    /// `InvalidOperation`.
    pub fn get_one(
        &self,
        session: &TransientSession,
        entity: &TransientEntity,
    ) -> CoreResult<Option<TransientEntity>> {
        match self {
            Self::ChildToParent(_) => {
                let entity = session.reattach(entity)?;
                match session.get_link(&entity, self.db_name())? {
                    Some(parent) => Ok(Some(parent)),
                    None => Err(CoreError::required_property_undefined(
                        &entity,
                        self.property(),
                    )),
                }
            }
            Self::ManyToOneOptional(_) => {
                let entity = session.reattach(entity)?;
                session.get_link(&entity, self.db_name())
            }
            Self::ParentToChildren(_) | Self::OneToMany(_) => Err(self.wrong_arity("get_one")),
        }
    }

    /// Writes a to-one link, keeping the opposite end consistent.
    ///
    /// Clearing an optional link that has no value does nothing.
    ///
    /// # Errors
    ///
    /// Clearing a `ChildToParent` link fails with
    /// `RequiredPropertyUndefined`. To-many links fail with
    /// `InvalidOperation`.
    pub fn set_one(
        &self,
        session: &TransientSession,
        entity: &TransientEntity,
        value: Option<&TransientEntity>,
    ) -> CoreResult<()> {
        match self {
            Self::ChildToParent(_) => {
                let entity = session.reattach(entity)?;
                let Some(parent) = value else {
                    return Err(CoreError::required_property_undefined(
                        &entity,
                        self.property(),
                    ));
                };
                let parent = session.reattach(parent)?;
                session.add_child(&parent, self.opposite(session), self.db_name(), &entity)
            }
            Self::ManyToOneOptional(_) => {
                let entity = session.reattach(entity)?;
                match value {
                    Some(one) => {
                        let one = session.reattach(one)?;
                        session.set_many_to_one(&entity, self.db_name(), self.opposite(session), &one)
                    }
                    None => match session.get_link(&entity, self.db_name())? {
                        Some(current) => session.remove_one_to_many(
                            &current,
                            self.opposite(session),
                            self.db_name(),
                            &entity,
                        ),
                        None => Ok(()),
                    },
                }
            }
            Self::ParentToChildren(_) | Self::OneToMany(_) => Err(self.wrong_arity("set_one")),
        }
    }

    /// Reads a to-many link.
    ///
    /// # Errors
    ///
    /// To-one links fail with `InvalidOperation`.
    pub fn get_many(
        &self,
        session: &TransientSession,
        entity: &TransientEntity,
    ) -> CoreResult<Vec<TransientEntity>> {
        match self {
            Self::ParentToChildren(_) | Self::OneToMany(_) => {
                let entity = session.reattach(entity)?;
                session.get_links(&entity, self.db_name())
            }
            Self::ChildToParent(_) | Self::ManyToOneOptional(_) => {
                Err(self.wrong_arity("get_many"))
            }
        }
    }

    /// Adds a target to a to-many link.
    ///
    /// A child added to a parent leaves its previous parent; an entity added
    /// to a one-to-many collection leaves its previous owner.
    ///
    /// # Errors
    ///
    /// To-one links fail with `InvalidOperation`.
    pub fn add(
        &self,
        session: &TransientSession,
        entity: &TransientEntity,
        target: &TransientEntity,
    ) -> CoreResult<()> {
        match self {
            Self::ParentToChildren(_) => {
                let entity = session.reattach(entity)?;
                let target = session.reattach(target)?;
                session.add_child(&entity, self.db_name(), self.opposite(session), &target)
            }
            Self::OneToMany(_) => {
                let entity = session.reattach(entity)?;
                let target = session.reattach(target)?;
                session.set_many_to_one(&target, self.opposite(session), self.db_name(), &entity)
            }
            Self::ChildToParent(_) | Self::ManyToOneOptional(_) => Err(self.wrong_arity("add")),
        }
    }

    /// Removes a target from a to-many link, on both ends.
    ///
    /// # Errors
    ///
    /// To-one links fail with `InvalidOperation`.
    pub fn remove(
        &self,
        session: &TransientSession,
        entity: &TransientEntity,
        target: &TransientEntity,
    ) -> CoreResult<()> {
        match self {
            Self::ParentToChildren(_) => {
                let entity = session.reattach(entity)?;
                let target = session.reattach(target)?;
                session.remove_child(&entity, self.db_name(), self.opposite(session), &target)
            }
            Self::OneToMany(_) => {
                let entity = session.reattach(entity)?;
                let target = session.reattach(target)?;
                session.remove_one_to_many(&entity, self.db_name(), self.opposite(session), &target)
            }
            Self::ChildToParent(_) | Self::ManyToOneOptional(_) => {
                Err(self.wrong_arity("remove"))
            }
        }
    }

    /// Returns `true` if the link has at least one target.
    pub fn is_defined(
        &self,
        session: &TransientSession,
        entity: &TransientEntity,
    ) -> CoreResult<bool> {
        match self {
            Self::ChildToParent(_) => {
                let entity = session.reattach(entity)?;
                Ok(session.get_link(&entity, self.db_name())?.is_some())
            }
            Self::ManyToOneOptional(_) => Ok(self.get_one(session, entity)?.is_some()),
            Self::ParentToChildren(_) | Self::OneToMany(_) => {
                Ok(!self.get_many(session, entity)?.is_empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_to_parent_policies() {
        let link = LinkDelegate::child_to_parent("project", "Project", "issues");
        let spec = link.spec();
        assert_eq!(spec.cardinality, AssociationEndCardinality::One);
        assert_eq!(spec.end_type, AssociationEndType::Child);
        assert_eq!(spec.on_delete, OnDeletePolicy::Clear);
        assert_eq!(spec.on_target_delete, OnDeletePolicy::Cascade);
    }

    #[test]
    fn parent_to_children_policies() {
        let link = LinkDelegate::parent_to_children("issues", "Issue", "project");
        let spec = link.spec();
        assert!(spec.cardinality.is_multiple());
        assert_eq!(spec.on_delete, OnDeletePolicy::Cascade);
        assert_eq!(spec.on_target_delete, OnDeletePolicy::Clear);
    }

    #[test]
    fn explicit_policies_are_kept() {
        let link = LinkDelegate::many_to_one_optional(
            "assignee",
            "User",
            "assigned",
            OnDeletePolicy::Clear,
            OnDeletePolicy::Fail,
        );
        assert_eq!(link.spec().on_target_delete, OnDeletePolicy::Fail);
        assert!(!link.spec().cardinality.is_required());
    }

    #[test]
    fn db_property_name_override() {
        let link = LinkDelegate::child_to_parent("project", "Project", "issues");
        assert_eq!(link.spec().db_property_name(), "project");

        let link = link.with_db_property_name("prj");
        assert_eq!(link.property(), "project");
        assert_eq!(link.spec().db_property_name(), "prj");
    }
}
