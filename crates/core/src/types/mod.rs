//! Note type definitions and the registry that holds them.
//!
//! A note type is a versioned schema for a class of documents:
//! - Property definitions (kind, required flag, default, transform, rule)
//! - An optional body template
//! - Descriptive metadata (category, tags, deprecation)
//!
//! Rules and transforms are plain serializable descriptors. The registry
//! rebuilds them from the descriptors every time a type is handed out, so a
//! type loaded from disk behaves exactly like one built in code.
//!
//! # Example Type Definition
//!
//! ```yaml
//! id: article
//! name: Article
//! version: 1.0.0
//! properties:
//!   - key: title
//!     external_key: title
//!     name: Title
//!     kind: text
//!     required: true
//!     rule: { kind: text, max_length: 120 }
//!   - key: slug
//!     external_key: slug
//!     name: Slug
//!     kind: text
//!     transform: { op: slugify }
//!     rule: { kind: text }
//! template:
//!   version: 1.0.0
//!   content: "# {{title}}"
//! ```

pub mod accessor;
pub mod definition;
pub mod errors;
pub mod registry;
pub mod schema;
pub mod validation;

pub use accessor::PropertyAccessor;
pub use definition::{CrossValidator, NoteType, TemplateSpec, TypeMetadata};
pub use errors::{ErrorCode, ValidationError, ValidationResult, ValidationWarning, WarningCode};
pub use registry::{
    RegisterOptions, RegistrySnapshot, ResolvedType, TypeFilter, TypeRegistry, TypeSummary,
    validate_structure,
};
pub use schema::{
    AssociationConfig, PropertyDefinition, PropertyKind, PropertyMap, SelectOption, Transform,
    ValidationRule, json_type_name,
};
pub use validation::{is_valid_date, is_valid_datetime};
