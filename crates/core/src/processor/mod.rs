//! Document and property processing against registered note types.

pub mod document;
pub mod property;
pub mod rules;

pub use document::{
    DEFAULT_TYPE_FIELD, DetectionConfidence, DetectionMethod, DocumentOptions, DocumentProcessor,
    DocumentResult, TypeDetection,
};
pub use property::{
    AssociationValidator, ProcessOptions, ProcessResult, PropertyProcessor, normalize_references,
};
pub use rules::{ConditionalRule, DependencyRule};
