//! Business rules registered on a [`super::PropertyProcessor`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::types::PropertyMap;

type DependencyFn = dyn Fn(Option<&Value>, &PropertyMap) -> Result<(), String> + Send + Sync;
type ConditionFn = dyn Fn(&PropertyMap) -> bool + Send + Sync;
type ConditionalFn = dyn Fn(Option<&Value>, &PropertyMap) -> Result<(), String> + Send + Sync;

/// A rule validating one property against the values of the properties it
/// depends on.
///
/// The rule runs even when the property has no value; it decides itself
/// whether absence is acceptable.
#[derive(Clone)]
pub struct DependencyRule {
    pub property_key: String,
    pub depends_on: Vec<String>,
    validate: Arc<DependencyFn>,
}

impl DependencyRule {
    pub fn new<F>(property_key: impl Into<String>, depends_on: &[&str], validate: F) -> Self
    where
        F: Fn(Option<&Value>, &PropertyMap) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            property_key: property_key.into(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            validate: Arc::new(validate),
        }
    }

    pub(crate) fn run(&self, value: Option<&Value>, dependencies: &PropertyMap) -> Result<(), String> {
        (self.validate)(value, dependencies)
    }
}

impl fmt::Debug for DependencyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRule")
            .field("property_key", &self.property_key)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// A rule validating one property only when a condition over the whole
/// property bag holds.
#[derive(Clone)]
pub struct ConditionalRule {
    pub property_key: String,
    condition: Arc<ConditionFn>,
    validate: Arc<ConditionalFn>,
}

impl ConditionalRule {
    pub fn new<C, F>(property_key: impl Into<String>, condition: C, validate: F) -> Self
    where
        C: Fn(&PropertyMap) -> bool + Send + Sync + 'static,
        F: Fn(Option<&Value>, &PropertyMap) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            property_key: property_key.into(),
            condition: Arc::new(condition),
            validate: Arc::new(validate),
        }
    }

    pub(crate) fn applies(&self, properties: &PropertyMap) -> bool {
        (self.condition)(properties)
    }

    pub(crate) fn run(&self, value: Option<&Value>, properties: &PropertyMap) -> Result<(), String> {
        (self.validate)(value, properties)
    }
}

impl fmt::Debug for ConditionalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalRule")
            .field("property_key", &self.property_key)
            .finish_non_exhaustive()
    }
}
