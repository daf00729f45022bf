//! Entity model registry.
//!
//! The model declares, per entity type, the scalar properties with their
//! constraints and the association links. It is assembled before the store
//! is built and does not change afterwards.

use crate::constraint::PropertyConstraints;
use crate::link::LinkDelegate;
use std::collections::BTreeMap;

/// Declaration of a scalar property.
#[derive(Debug, Clone)]
pub struct PropertyModel {
    name: String,
    required: bool,
    constraints: PropertyConstraints,
}

impl PropertyModel {
    /// Declares an optional, unconstrained property.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            constraints: PropertyConstraints::new(),
        }
    }

    /// Marks the property as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the property's constraints.
    #[must_use]
    pub fn constraints(mut self, constraints: PropertyConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if a value is required.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the constraints in registration order.
    #[must_use]
    pub fn property_constraints(&self) -> &PropertyConstraints {
        &self.constraints
    }
}

/// Declaration of an entity type.
#[derive(Debug, Clone)]
pub struct EntityTypeModel {
    name: String,
    properties: Vec<PropertyModel>,
    links: Vec<LinkDelegate>,
}

impl EntityTypeModel {
    /// Declares a type with no properties or links.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Adds a scalar property.
    #[must_use]
    pub fn property(mut self, property: PropertyModel) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds an association link.
    #[must_use]
    pub fn link(mut self, link: LinkDelegate) -> Self {
        self.links.push(link);
        self
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyModel] {
        &self.properties
    }

    /// Returns the links in declaration order.
    #[must_use]
    pub fn links(&self) -> &[LinkDelegate] {
        &self.links
    }

    /// Finds a link by property name.
    #[must_use]
    pub fn find_link(&self, property: &str) -> Option<&LinkDelegate> {
        self.links.iter().find(|l| l.property() == property)
    }
}

/// All declared entity types.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    types: BTreeMap<String, EntityTypeModel>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type, replacing any earlier declaration with its name.
    #[must_use]
    pub fn with_type(mut self, model: EntityTypeModel) -> Self {
        self.types.insert(model.name.clone(), model);
        self
    }

    /// Looks up a type.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityTypeModel> {
        self.types.get(name)
    }

    /// Returns `true` if the type is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Iterates the declared types by name.
    pub fn types(&self) -> impl Iterator<Item = &EntityTypeModel> {
        self.types.values()
    }

    /// Returns the links declared on other types that point at `name`,
    /// together with their owning type.
    pub fn links_targeting<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (&'a EntityTypeModel, &'a LinkDelegate)> + 'a {
        self.types.values().flat_map(move |model| {
            model
                .links
                .iter()
                .filter(move |link| link.spec().opposite_type == name)
                .map(move |link| (model, link))
        })
    }
}
