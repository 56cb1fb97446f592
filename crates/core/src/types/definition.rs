//! Note type definition structures.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::accessor::PropertyAccessor;
use super::errors::ValidationError;
use super::schema::{PropertyDefinition, PropertyKind, PropertyMap, ValidationRule};

/// Whole-record validator run after every per-property pass succeeded.
pub type CrossValidator = Arc<dyn Fn(&PropertyMap) -> Vec<ValidationError> + Send + Sync>;

/// Body template attached to a note type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Template text (supports {{var}} placeholders).
    #[serde(default)]
    pub content: String,

    /// Variables the template expects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,

    #[serde(default)]
    pub version: String,

    /// Template this one extends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl TemplateSpec {
    pub fn new(content: impl Into<String>, version: impl Into<String>) -> Self {
        Self { content: content.into(), variables: vec![], version: version.into(), parent: None }
    }
}

/// Descriptive metadata of a note type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A versioned schema for a class of documents.
#[derive(Clone, Serialize, Deserialize)]
pub struct NoteType {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Semantic version string (major.minor.patch).
    #[serde(default)]
    pub version: String,

    /// Property definitions in declaration order.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateSpec>,

    #[serde(default)]
    pub metadata: TypeMetadata,

    /// Never persisted.
    #[serde(skip)]
    pub cross_validator: Option<CrossValidator>,
}

impl fmt::Debug for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("properties", &self.properties)
            .field("template", &self.template)
            .field("metadata", &self.metadata)
            .field("cross_validator", &self.cross_validator.is_some())
            .finish()
    }
}

impl PartialEq for NoteType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.version == other.version
            && self.properties == other.properties
            && self.template == other.template
            && self.metadata == other.metadata
    }
}

impl NoteType {
    /// Create a note type without properties or template.
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            template: None,
            version: version.into(),
            properties: vec![],
            metadata: TypeMetadata::default(),
            cross_validator: None,
        }
    }

    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_template(mut self, template: TemplateSpec) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_metadata(mut self, metadata: TypeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_cross_validator(
        mut self,
        validator: impl Fn(&PropertyMap) -> Vec<ValidationError> + Send + Sync + 'static,
    ) -> Self {
        self.cross_validator = Some(Arc::new(validator));
        self
    }

    /// Get a property definition by logical key.
    pub fn property(&self, key: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.key == key)
    }

    pub fn property_mut(&mut self, key: &str) -> Option<&mut PropertyDefinition> {
        self.properties.iter_mut().find(|p| p.key == key)
    }

    /// Get a list of required property keys.
    pub fn required_properties(&self) -> Vec<&str> {
        self.properties.iter().filter(|p| p.required).map(|p| p.key.as_str()).collect()
    }

    /// Read-only accessors over every property.
    pub fn accessors(&self) -> Vec<PropertyAccessor> {
        self.properties.iter().map(PropertyAccessor::new).collect()
    }

    /// Rebuild every executable rule and transform from its descriptor.
    ///
    /// Stored rules are never trusted: choice rules are regenerated from the
    /// select options, association rules from the association config, and any
    /// missing or kind-incompatible rule is replaced with the kind's default.
    /// Transforms that do not fit the property kind are dropped.
    pub fn reconstructed(&self) -> NoteType {
        let mut rebuilt = self.clone();
        for prop in &mut rebuilt.properties {
            prop.rule = Some(reconstruct_rule(prop));

            let unfit =
                prop.transform.as_ref().filter(|t| !t.fits(prop.kind)).map(|t| t.name());
            if let Some(transform) = unfit {
                warn!(
                    note_type = %self.id,
                    property = %prop.key,
                    transform,
                    "dropping transform incompatible with property kind"
                );
                prop.transform = None;
            }
        }
        rebuilt
    }
}

fn reconstruct_rule(prop: &PropertyDefinition) -> ValidationRule {
    match prop.kind {
        PropertyKind::Select | PropertyKind::Enum if !prop.select_options.is_empty() => {
            ValidationRule::Enum {
                values: prop.select_options.iter().map(|o| o.value.clone()).collect(),
            }
        }
        PropertyKind::Association => ValidationRule::Association {
            multiple: prop.association.as_ref().is_some_and(|a| a.multiple),
        },
        kind => match &prop.rule {
            Some(rule) if rule.fits(kind) => rule.clone(),
            _ => ValidationRule::default_for(kind),
        },
    }
}
