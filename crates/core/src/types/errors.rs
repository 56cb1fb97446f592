//! Validation records and result builders.
//!
//! Every validating operation in the crate reports domain failures through a
//! [`ValidationResult`] instead of an `Err`, so a host can render the complete
//! list of errors and warnings produced by one call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable error code attached to every [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RequiredPropertyMissing,
    TypeMismatch,
    ConstraintViolation,
    EnumViolation,
    TransformationError,
    DependencyViolation,
    ConditionalViolation,
    AssociationInvalid,
    CrossPropertyInvalid,
    MissingField,
    InvalidField,
    DuplicatePropertyKey,
    InvalidVersion,
    DuplicateNoteType,
    InvalidVersionUpdate,
    NoteTypeNotFound,
    NoteTypeNotDetected,
    HeaderParseError,
    RenderError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiredPropertyMissing => "REQUIRED_PROPERTY_MISSING",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Self::EnumViolation => "ENUM_VIOLATION",
            Self::TransformationError => "TRANSFORMATION_ERROR",
            Self::DependencyViolation => "DEPENDENCY_VIOLATION",
            Self::ConditionalViolation => "CONDITIONAL_VIOLATION",
            Self::AssociationInvalid => "ASSOCIATION_INVALID",
            Self::CrossPropertyInvalid => "CROSS_PROPERTY_INVALID",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidField => "INVALID_FIELD",
            Self::DuplicatePropertyKey => "DUPLICATE_PROPERTY_KEY",
            Self::InvalidVersion => "INVALID_VERSION",
            Self::DuplicateNoteType => "DUPLICATE_NOTE_TYPE",
            Self::InvalidVersionUpdate => "INVALID_VERSION_UPDATE",
            Self::NoteTypeNotFound => "NOTE_TYPE_NOT_FOUND",
            Self::NoteTypeNotDetected => "NOTE_TYPE_NOT_DETECTED",
            Self::HeaderParseError => "HEADER_PARSE_ERROR",
            Self::RenderError => "RENDER_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable code attached to every [`ValidationWarning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    ExplicitTypeUnresolved,
    DeprecatedNoteType,
    AssociationTargetMissing,
    TransformDropped,
    UnresolvedPlaceholder,
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ExplicitTypeUnresolved => "EXPLICIT_TYPE_UNRESOLVED",
            Self::DeprecatedNoteType => "DEPRECATED_NOTE_TYPE",
            Self::AssociationTargetMissing => "ASSOCIATION_TARGET_MISSING",
            Self::TransformDropped => "TRANSFORM_DROPPED",
            Self::UnresolvedPlaceholder => "UNRESOLVED_PLACEHOLDER",
        };
        f.write_str(s)
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    pub code: ErrorCode,
    /// Logical key of the property the error belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Dotted path inside the record (e.g. `properties.title.name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ValidationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            property: None,
            path: None,
            expected: None,
            actual: None,
        }
    }

    pub fn for_property(
        code: ErrorCode,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, message).with_property(property)
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_expected_actual(
        mut self,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(p) => write!(f, "[{}] {}: {}", self.code, p, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// A non-blocking observation. Warnings never affect validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub message: String,
    pub code: WarningCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self { message: message.into(), code, property: None, suggestion: None }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(s) = &self.suggestion {
            write!(f, " ({s})")?;
        }
        Ok(())
    }
}

/// Result of a validating operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult<T = ()> {
    /// Whether the operation succeeded.
    pub valid: bool,
    /// Output data, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Validation errors (empty if valid).
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    /// Non-fatal warnings.
    #[serde(default)]
    pub warnings: Vec<ValidationWarning>,
}

impl<T> Default for ValidationResult<T> {
    fn default() -> Self {
        Self { valid: true, data: None, errors: vec![], warnings: vec![] }
    }
}

impl<T> ValidationResult<T> {
    /// Create a successful result carrying data.
    pub fn success(data: T) -> Self {
        Self { valid: true, data: Some(data), errors: vec![], warnings: vec![] }
    }

    /// Create a failed result.
    pub fn failure(errors: Vec<ValidationError>) -> Self {
        Self { valid: errors.is_empty(), data: None, errors, warnings: vec![] }
    }

    /// Create a failed result with a single error.
    pub fn single_error(error: ValidationError) -> Self {
        Self::failure(vec![error])
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.valid = false;
        self.data = None;
    }

    /// Add a warning to the result.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Merge another result's errors and warnings into this one.
    pub fn merge<U>(&mut self, other: ValidationResult<U>) {
        self.warnings.extend(other.warnings);
        if !other.errors.is_empty() || !other.valid {
            self.valid = false;
            self.data = None;
        }
        self.errors.extend(other.errors);
    }

    pub fn with_warnings(mut self, warnings: Vec<ValidationWarning>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Errors carrying a given code.
    pub fn errors_with(&self, code: ErrorCode) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.code == code)
    }

    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

impl ValidationResult<()> {
    /// A successful result with no payload.
    pub fn ok() -> Self {
        Self::success(())
    }
}
