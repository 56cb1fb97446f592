//! Read-only view over a property definition.

use serde_json::Value;

use super::schema::{AssociationConfig, PropertyDefinition, PropertyKind, SelectOption};

/// Snapshot of a [`PropertyDefinition`] with derived getters.
///
/// The accessor copies the definition's fields; the definition never refers
/// back to it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccessor {
    key: String,
    external_key: String,
    name: String,
    kind: PropertyKind,
    required: bool,
    raw_default: Option<Value>,
    description: Option<String>,
    visible: bool,
    order: i32,
    options: Vec<SelectOption>,
    association: Option<AssociationConfig>,
    source: Option<String>,
    link: bool,
}

impl PropertyAccessor {
    pub fn new(def: &PropertyDefinition) -> Self {
        Self {
            key: def.key.clone(),
            external_key: def.external_key.clone(),
            name: def.name.clone(),
            kind: def.kind,
            required: def.required,
            raw_default: def.default_value.clone(),
            description: def.description.clone(),
            visible: def.visible,
            order: def.order,
            options: def.select_options.clone(),
            association: def.association.clone(),
            source: def.source.clone(),
            link: def.link,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn external_key(&self) -> &str {
        &self.external_key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn association(&self) -> Option<&AssociationConfig> {
        self.association.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether the value is computed rather than entered.
    pub fn is_computed(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_link(&self) -> bool {
        self.link
    }

    /// Resolved default: a select option flagged `is_default` wins over the
    /// raw default value.
    pub fn default(&self) -> Option<Value> {
        self.options
            .iter()
            .find(|o| o.is_default)
            .map(|o| Value::String(o.value.clone()))
            .or_else(|| self.raw_default.clone())
    }

    pub fn has_default(&self) -> bool {
        self.default().is_some()
    }

    /// Option values marked as "done".
    pub fn done_values(&self) -> Vec<&str> {
        self.options.iter().filter(|o| o.is_done).map(|o| o.value.as_str()).collect()
    }

    /// Option values marked as "in progress".
    pub fn in_progress_values(&self) -> Vec<&str> {
        self.options.iter().filter(|o| o.is_in_progress).map(|o| o.value.as_str()).collect()
    }
}

impl From<&PropertyDefinition> for PropertyAccessor {
    fn from(def: &PropertyDefinition) -> Self {
        Self::new(def)
    }
}
