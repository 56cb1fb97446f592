//! Whole-document processing: header extraction, type detection and
//! property processing.

use std::fmt;
use std::path::{Component, Path};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::property::{ProcessOptions, PropertyProcessor};
use crate::cache::TypeCache;
use crate::header::extract_header;
use crate::templates::{SimpleTemplateRenderer, TemplateRenderer};
use crate::types::{
    ErrorCode, NoteType, PropertyMap, TypeRegistry, ValidationError, ValidationResult,
    ValidationWarning, WarningCode,
};

/// Default header field naming a document's note type.
pub const DEFAULT_TYPE_FIELD: &str = "type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionConfidence {
    High,
    Medium,
    Low,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// Declared in the document header.
    Explicit,
    /// Matched against the document path.
    Path,
    None,
}

impl fmt::Display for DetectionConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        })
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Path => "path",
            Self::None => "none",
        })
    }
}

/// Outcome of [`DocumentProcessor::detect_type`].
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDetection {
    pub note_type: Option<NoteType>,
    pub confidence: DetectionConfidence,
    pub method: DetectionMethod,
    pub warnings: Vec<ValidationWarning>,
}

impl TypeDetection {
    fn none(warnings: Vec<ValidationWarning>) -> Self {
        Self {
            note_type: None,
            confidence: DetectionConfidence::None,
            method: DetectionMethod::None,
            warnings,
        }
    }
}

/// Options for [`DocumentProcessor::process_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOptions {
    /// Force a note type; an unknown id is an error.
    pub explicit_type_id: Option<String>,
    /// Detect the type from the header and path when none is forced.
    pub auto_detect_type: bool,
    pub property_options: ProcessOptions,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self { explicit_type_id: None, auto_detect_type: true, property_options: ProcessOptions::default() }
    }
}

impl DocumentOptions {
    pub fn with_type(type_id: impl Into<String>) -> Self {
        Self { explicit_type_id: Some(type_id.into()), ..Self::default() }
    }
}

/// Outcome of processing one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentResult {
    pub valid: bool,
    /// Id of the note type the document was processed against.
    pub note_type: Option<String>,
    pub type_version: Option<String>,
    pub confidence: DetectionConfidence,
    pub method: DetectionMethod,
    pub properties: PropertyMap,
    pub transformed: Vec<String>,
    pub defaulted: Vec<String>,
    #[serde(skip)]
    pub body: String,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl DocumentResult {
    /// A failed result for a document whose content could not be read.
    pub fn unreadable(path: &Path, message: impl Into<String>) -> Self {
        Self::failed(
            ValidationError::new(ErrorCode::HeaderParseError, message)
                .with_path(path.display().to_string()),
            vec![],
            String::new(),
        )
    }

    fn failed(error: ValidationError, warnings: Vec<ValidationWarning>, body: String) -> Self {
        Self {
            valid: false,
            note_type: None,
            type_version: None,
            confidence: DetectionConfidence::None,
            method: DetectionMethod::None,
            properties: PropertyMap::new(),
            transformed: vec![],
            defaulted: vec![],
            body,
            errors: vec![error],
            warnings,
        }
    }
}

/// Processes raw documents against the note types of a registry.
pub struct DocumentProcessor<'r> {
    registry: &'r TypeRegistry,
    cache: Option<&'r Mutex<TypeCache>>,
    properties: PropertyProcessor,
    renderer: Arc<dyn TemplateRenderer>,
    type_field: String,
}

impl<'r> DocumentProcessor<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            cache: None,
            properties: PropertyProcessor::new(),
            renderer: Arc::new(SimpleTemplateRenderer),
            type_field: DEFAULT_TYPE_FIELD.to_string(),
        }
    }

    /// Resolve note types through a cache before reconstructing them from
    /// the registry.
    pub fn with_cache(mut self, cache: Option<&'r Mutex<TypeCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_property_processor(mut self, processor: PropertyProcessor) -> Self {
        self.properties = processor;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_type_field(mut self, field: impl Into<String>) -> Self {
        self.type_field = field.into();
        self
    }

    pub fn property_processor(&self) -> &PropertyProcessor {
        &self.properties
    }

    pub fn property_processor_mut(&mut self) -> &mut PropertyProcessor {
        &mut self.properties
    }

    /// Detect the note type of a document from its header and path.
    ///
    /// A declared type that resolves wins outright. Otherwise the first
    /// registered id (in registration order) that names a path segment or
    /// appears in the file name matches, case-insensitively.
    pub fn detect_type(&self, header: &PropertyMap, path: &Path) -> TypeDetection {
        let mut warnings = Vec::new();

        if let Some(declared) = header.get(&self.type_field).and_then(declared_type) {
            if let Some(note_type) = self.resolve(&declared) {
                debug!(note_type = %declared, "type declared in header");
                return TypeDetection {
                    note_type: Some(note_type),
                    confidence: DetectionConfidence::High,
                    method: DetectionMethod::Explicit,
                    warnings,
                };
            }
            warn!(note_type = %declared, path = %path.display(), "declared note type is not registered");
            warnings.push(
                ValidationWarning::new(
                    WarningCode::ExplicitTypeUnresolved,
                    format!("declared note type '{}' is not registered", declared),
                )
                .with_property(self.type_field.clone()),
            );
        }

        if let Some(id) = self.match_path(path)
            && let Some(note_type) = self.resolve(id)
        {
            debug!(note_type = %id, path = %path.display(), "type detected from path");
            return TypeDetection {
                note_type: Some(note_type),
                confidence: DetectionConfidence::Medium,
                method: DetectionMethod::Path,
                warnings,
            };
        }

        TypeDetection::none(warnings)
    }

    /// A registered note type, served from the cache when the cached
    /// definition carries the registered version.
    fn resolve(&self, id: &str) -> Option<NoteType> {
        let version = self.registry.version_of(id)?;
        let Some(cache) = self.cache else {
            return self.registry.get(id).map(|resolved| resolved.into_note_type());
        };

        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(id).filter(|nt| nt.version == version) {
            return Some(cached);
        }

        let note_type = self.registry.get(id)?.into_note_type();
        // Cross validators do not survive the persistent tier.
        if note_type.cross_validator.is_none() {
            cache.set(id, note_type.clone());
        }
        Some(note_type)
    }

    fn match_path(&self, path: &Path) -> Option<&str> {
        let segments: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().to_lowercase()),
                _ => None,
            })
            .collect();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        self.registry.ids().find(|id| {
            let id = id.to_lowercase();
            segments.iter().any(|s| *s == id) || file_name.contains(&id)
        })
    }

    /// Extract, type and process one document.
    pub async fn process_document(
        &self,
        content: &str,
        path: &Path,
        options: &DocumentOptions,
    ) -> DocumentResult {
        let extracted = match extract_header(content) {
            Ok(extracted) => extracted,
            Err(e) => {
                return DocumentResult::failed(
                    ValidationError::new(ErrorCode::HeaderParseError, e.to_string())
                        .with_path(path.display().to_string()),
                    vec![],
                    content.to_string(),
                );
            }
        };

        let mut warnings = Vec::new();
        let (note_type, confidence, method) = if let Some(id) = &options.explicit_type_id {
            match self.resolve(id) {
                Some(note_type) => (note_type, DetectionConfidence::High, DetectionMethod::Explicit),
                None => {
                    return DocumentResult::failed(
                        ValidationError::new(
                            ErrorCode::NoteTypeNotFound,
                            format!("note type '{}' is not registered", id),
                        ),
                        warnings,
                        extracted.body,
                    );
                }
            }
        } else {
            let detection = if options.auto_detect_type {
                self.detect_type(&extracted.header, path)
            } else {
                TypeDetection::none(vec![])
            };
            warnings.extend(detection.warnings);
            match detection.note_type {
                Some(nt) => (nt, detection.confidence, detection.method),
                None => {
                    return DocumentResult::failed(
                        ValidationError::new(
                            ErrorCode::NoteTypeNotDetected,
                            format!("could not determine the note type of {}", path.display()),
                        ),
                        warnings,
                        extracted.body,
                    );
                }
            }
        };

        let processed = self
            .properties
            .process(&note_type, &extracted.header, &options.property_options)
            .await;
        warnings.extend(processed.warnings);

        DocumentResult {
            valid: processed.valid,
            note_type: Some(note_type.id),
            type_version: Some(note_type.version),
            confidence,
            method,
            properties: processed.properties,
            transformed: processed.transformed,
            defaulted: processed.defaulted,
            body: extracted.body,
            errors: processed.errors,
            warnings,
        }
    }

    /// Render a note type's body template with the given values.
    pub fn render_template(&self, note_type: &NoteType, variables: &PropertyMap) -> ValidationResult<String> {
        match &note_type.template {
            Some(template) => self.renderer.render(&template.content, variables),
            None => ValidationResult::single_error(ValidationError::new(
                ErrorCode::RenderError,
                format!("note type '{}' has no template", note_type.id),
            )),
        }
    }
}

fn declared_type(value: &Value) -> Option<String> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use crate::types::{PropertyDefinition, PropertyKind, RegisterOptions, TemplateSpec};
    use serde_json::json;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        for (id, name) in [("task", "Task"), ("meeting", "Meeting"), ("project", "Project")] {
            let nt = NoteType::new(id, name, "1.0.0")
                .with_property(PropertyDefinition::new("title", "Title", PropertyKind::Text).required())
                .with_template(TemplateSpec::new("# {{title}}", "1.0.0"));
            assert!(registry.register(nt, RegisterOptions::default()).valid);
        }
        registry
    }

    fn header(value: Value) -> PropertyMap {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_detect_explicit_beats_path() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let detection =
            processor.detect_type(&header(json!({"type": "meeting"})), Path::new("tasks/task-1.md"));

        assert_eq!(detection.note_type.map(|n| n.id).as_deref(), Some("meeting"));
        assert_eq!(detection.confidence, DetectionConfidence::High);
        assert_eq!(detection.method, DetectionMethod::Explicit);
    }

    #[test]
    fn test_detect_unresolved_explicit_falls_back_to_path() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let detection =
            processor.detect_type(&header(json!({"type": "recipe"})), Path::new("work/Project/plan.md"));

        assert_eq!(detection.note_type.map(|n| n.id).as_deref(), Some("project"));
        assert_eq!(detection.confidence, DetectionConfidence::Medium);
        assert_eq!(detection.method, DetectionMethod::Path);
        assert_eq!(detection.warnings[0].code, WarningCode::ExplicitTypeUnresolved);
    }

    #[test]
    fn test_detect_by_filename_substring_in_registration_order() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let detection =
            processor.detect_type(&PropertyMap::new(), Path::new("notes/meeting-about-task.md"));
        assert_eq!(detection.note_type.map(|n| n.id).as_deref(), Some("task"));
    }

    #[test]
    fn test_detect_nothing_is_not_an_error() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let detection = processor.detect_type(&PropertyMap::new(), Path::new("journal/2024.md"));
        assert!(detection.note_type.is_none());
        assert_eq!(detection.confidence, DetectionConfidence::None);
        assert!(detection.warnings.is_empty());
    }

    #[test]
    fn test_custom_type_field() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry).with_type_field("kind");
        let detection = processor.detect_type(&header(json!({"kind": "task"})), Path::new("x.md"));
        assert_eq!(detection.method, DetectionMethod::Explicit);
    }

    #[tokio::test]
    async fn test_process_document_success() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let result = processor
            .process_document(
                "---\ntype: task\ntitle: Write docs\n---\nBody text\n",
                Path::new("inbox/note.md"),
                &DocumentOptions::default(),
            )
            .await;

        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(result.note_type.as_deref(), Some("task"));
        assert_eq!(result.properties, header(json!({"title": "Write docs"})));
        assert_eq!(result.body, "Body text\n");
    }

    #[tokio::test]
    async fn test_invalid_explicit_type_is_an_error() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let result = processor
            .process_document("---\ntitle: x\n---\n", Path::new("tasks/a.md"), &DocumentOptions::with_type("recipe"))
            .await;

        assert!(!result.valid);
        assert_eq!(result.errors[0].code, ErrorCode::NoteTypeNotFound);
    }

    #[tokio::test]
    async fn test_undetected_type_is_an_error() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let result = processor
            .process_document("---\ntitle: x\n---\n", Path::new("journal/a.md"), &DocumentOptions::default())
            .await;
        assert_eq!(result.errors[0].code, ErrorCode::NoteTypeNotDetected);

        let no_detect = DocumentOptions { auto_detect_type: false, ..Default::default() };
        let result = processor
            .process_document("---\ntype: task\ntitle: x\n---\n", Path::new("tasks/a.md"), &no_detect)
            .await;
        assert_eq!(result.errors[0].code, ErrorCode::NoteTypeNotDetected);
    }

    #[tokio::test]
    async fn test_header_error_aborts() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let result = processor
            .process_document("---\ntags: [a, b\n---\n", Path::new("tasks/a.md"), &DocumentOptions::default())
            .await;
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::HeaderParseError);
    }

    #[tokio::test]
    async fn test_property_errors_make_document_invalid() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let result = processor
            .process_document("---\ntype: task\n---\n", Path::new("a.md"), &DocumentOptions::default())
            .await;
        assert!(!result.valid);
        assert_eq!(result.note_type.as_deref(), Some("task"));
        assert_eq!(result.errors[0].code, ErrorCode::RequiredPropertyMissing);
    }

    #[tokio::test]
    async fn test_types_resolved_through_cache() {
        let registry = registry();
        let cache = Mutex::new(TypeCache::new(CacheOptions { ttl: None, capacity: 8 }));
        let processor = DocumentProcessor::new(&registry).with_cache(Some(&cache));
        let doc = "---\ntype: task\n---\n";

        let first = processor.process_document(doc, Path::new("a.md"), &DocumentOptions::default()).await;
        assert!(!first.valid);
        assert!(cache.lock().unwrap().contains("task"));

        // A cached definition with the registered version is served as is.
        let relaxed = NoteType::new("task", "Task", "1.0.0")
            .with_property(PropertyDefinition::new("title", "Title", PropertyKind::Text));
        cache.lock().unwrap().set("task", relaxed);
        let cached = processor.process_document(doc, Path::new("a.md"), &DocumentOptions::default()).await;
        assert!(cached.valid, "{:?}", cached.errors);

        // A cached definition with another version is ignored and replaced.
        let outdated = NoteType::new("task", "Task", "0.9.0");
        cache.lock().unwrap().set("task", outdated);
        let refreshed =
            processor.process_document(doc, Path::new("a.md"), &DocumentOptions::with_type("task")).await;
        assert!(!refreshed.valid);
        assert_eq!(cache.lock().unwrap().get("task").unwrap().version, "1.0.0");
        assert!(cache.lock().unwrap().stats().hits >= 1);
    }

    #[test]
    fn test_render_template() {
        let registry = registry();
        let processor = DocumentProcessor::new(&registry);
        let task = registry.get("task").unwrap().into_note_type();

        let rendered = processor.render_template(&task, &header(json!({"title": "Ship it"})));
        assert_eq!(rendered.data.as_deref(), Some("# Ship it"));

        let bare = NoteType::new("bare", "Bare", "1.0.0");
        assert!(processor.render_template(&bare, &PropertyMap::new()).has_error(ErrorCode::RenderError));
    }
}
