//! Typed-document schema engine.
//!
//! Defines versioned note type schemas over documents made of a small
//! key/value header and a free-form body, validates and normalizes header
//! values against them, detects which schema applies to a document, and
//! migrates schemas and documents over time.

pub mod cache;
pub mod config;
pub mod error;
pub mod header;
pub mod migration;
pub mod processor;
pub mod state;
pub mod store;
pub mod templates;
pub mod types;
pub mod version;

pub use error::{CollaboratorError, CollaboratorResult};
pub use processor::{DocumentProcessor, PropertyProcessor};
pub use types::{NoteType, PropertyDefinition, TypeRegistry, ValidationResult};
pub use version::SemanticVersion;
