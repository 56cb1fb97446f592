//! Type registry for managing note type definitions.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::accessor::PropertyAccessor;
use super::definition::{NoteType, TypeMetadata};
use super::errors::{ErrorCode, ValidationError, ValidationResult, ValidationWarning, WarningCode};
use crate::version::{SemanticVersion, compare_versions, compare_versions_lenient};

/// Options controlling [`TypeRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Replace an existing definition with the same id.
    pub allow_overwrite: bool,
    /// Run structural validation before storing.
    pub validate: bool,
    /// On overwrite, require a strictly greater version.
    pub check_compatibility: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self { allow_overwrite: false, validate: true, check_compatibility: true }
    }
}

impl RegisterOptions {
    pub fn overwrite() -> Self {
        Self { allow_overwrite: true, ..Self::default() }
    }
}

/// Read-time filter for listing note types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFilter {
    pub include_deprecated: bool,
    pub category: Option<String>,
    pub tag: Option<String>,
}

impl Default for TypeFilter {
    fn default() -> Self {
        Self { include_deprecated: true, category: None, tag: None }
    }
}

impl TypeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn active_only(mut self) -> Self {
        self.include_deprecated = false;
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn matches(&self, metadata: &TypeMetadata) -> bool {
        if !self.include_deprecated && metadata.deprecated {
            return false;
        }
        if let Some(category) = &self.category
            && metadata.category.as_deref() != Some(category.as_str())
        {
            return false;
        }
        if let Some(tag) = &self.tag
            && !metadata.tags.iter().any(|t| t == tag)
        {
            return false;
        }
        true
    }
}

/// Listing entry without property details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub property_count: usize,
    pub metadata: TypeMetadata,
}

/// A note type as read back from the registry: rules reconstructed and every
/// property wrapped in an accessor.
#[derive(Debug, Clone)]
pub struct ResolvedType {
    note_type: NoteType,
    properties: Vec<PropertyAccessor>,
}

impl ResolvedType {
    fn new(stored: &NoteType) -> Self {
        let note_type = stored.reconstructed();
        let properties = note_type.accessors();
        Self { note_type, properties }
    }

    pub fn note_type(&self) -> &NoteType {
        &self.note_type
    }

    pub fn into_note_type(self) -> NoteType {
        self.note_type
    }

    pub fn id(&self) -> &str {
        &self.note_type.id
    }

    pub fn version(&self) -> &str {
        &self.note_type.version
    }

    pub fn properties(&self) -> &[PropertyAccessor] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyAccessor> {
        self.properties.iter().find(|p| p.key() == key)
    }
}

/// Serializable registry state: definitions in registration order plus the
/// per-id version history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub note_types: Vec<NoteType>,
    #[serde(default)]
    pub history: HashMap<String, Vec<String>>,
}

/// Registry of all registered note types.
///
/// Plain in-memory state with no internal locking; callers owning the
/// registry from several tasks must serialize mutations themselves.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, NoteType>,

    /// Ids in registration order (first registration wins the slot).
    order: Vec<String>,

    /// Registered versions per id, sorted by version.
    history: HashMap<String, Vec<String>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a note type.
    pub fn register(&mut self, note_type: NoteType, options: RegisterOptions) -> ValidationResult {
        if options.validate {
            let errors = validate_structure(&note_type);
            if !errors.is_empty() {
                debug!(id = %note_type.id, errors = errors.len(), "note type failed structural validation");
                return ValidationResult::failure(errors);
            }
        }

        let mut result = ValidationResult::ok();

        if let Some(existing) = self.types.get(&note_type.id) {
            if !options.allow_overwrite {
                return ValidationResult::single_error(
                    ValidationError::new(
                        ErrorCode::DuplicateNoteType,
                        format!("note type '{}' is already registered", note_type.id),
                    )
                    .with_path("id"),
                );
            }

            if options.check_compatibility {
                match compare_versions(&note_type.version, &existing.version) {
                    Ok(Ordering::Greater) => {}
                    Ok(_) => {
                        return ValidationResult::single_error(
                            ValidationError::new(
                                ErrorCode::InvalidVersionUpdate,
                                format!(
                                    "version {} of '{}' must be greater than registered version {}",
                                    note_type.version, note_type.id, existing.version
                                ),
                            )
                            .with_path("version")
                            .with_expected_actual(
                                format!("> {}", existing.version),
                                note_type.version.clone(),
                            ),
                        );
                    }
                    Err(e) => {
                        return ValidationResult::single_error(
                            ValidationError::new(ErrorCode::InvalidVersion, e.to_string())
                                .with_path("version"),
                        );
                    }
                }
            }
        }

        if note_type.metadata.deprecated {
            result.add_warning(
                ValidationWarning::new(
                    WarningCode::DeprecatedNoteType,
                    format!("note type '{}' is registered as deprecated", note_type.id),
                )
                .with_suggestion("prefer a non-deprecated replacement for new documents"),
            );
        }

        let id = note_type.id.clone();
        let version = note_type.version.clone();

        if !self.types.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.types.insert(id.clone(), note_type);

        let versions = self.history.entry(id.clone()).or_default();
        if !versions.contains(&version) {
            versions.push(version.clone());
            versions.sort_by(|a, b| compare_versions_lenient(a, b));
        }

        info!(%id, %version, "registered note type");
        result
    }

    /// Remove a note type together with its version history.
    pub fn unregister(&mut self, id: &str) -> Option<NoteType> {
        let removed = self.types.remove(id)?;
        self.order.retain(|existing| existing != id);
        self.history.remove(id);
        info!(%id, "unregistered note type");
        Some(removed)
    }

    /// Get a note type by id, with rules reconstructed from their descriptors.
    pub fn get(&self, id: &str) -> Option<ResolvedType> {
        self.types.get(id).map(ResolvedType::new)
    }

    /// Currently registered version of a note type.
    pub fn version_of(&self, id: &str) -> Option<&str> {
        self.types.get(id).map(|nt| nt.version.as_str())
    }

    /// Check if a note type is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// All note types passing the filter, in registration order.
    pub fn get_all(&self, filter: &TypeFilter) -> Vec<ResolvedType> {
        self.ordered()
            .filter(|nt| filter.matches(&nt.metadata))
            .map(ResolvedType::new)
            .collect()
    }

    /// Summaries of all note types passing the filter.
    pub fn get_all_metadata(&self, filter: &TypeFilter) -> Vec<TypeSummary> {
        self.ordered()
            .filter(|nt| filter.matches(&nt.metadata))
            .map(|nt| TypeSummary {
                id: nt.id.clone(),
                name: nt.name.clone(),
                version: nt.version.clone(),
                property_count: nt.properties.len(),
                metadata: nt.metadata.clone(),
            })
            .collect()
    }

    /// Registered versions for an id, oldest first.
    pub fn version_history(&self, id: &str) -> Option<&[String]> {
        self.history.get(id).map(Vec::as_slice)
    }

    /// Get the number of registered note types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Capture the persistable state.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            note_types: self.ordered().cloned().collect(),
            history: self.history.clone(),
        }
    }

    /// Rebuild a registry from persisted state.
    ///
    /// Definitions are stored verbatim; version gating does not apply since
    /// the snapshot was produced by a registry that already enforced it.
    pub fn restore(snapshot: RegistrySnapshot) -> Self {
        let mut registry = Self::new();
        for note_type in snapshot.note_types {
            if !registry.types.contains_key(&note_type.id) {
                registry.order.push(note_type.id.clone());
            }
            registry.types.insert(note_type.id.clone(), note_type);
        }
        for (id, mut versions) in snapshot.history {
            if registry.types.contains_key(&id) {
                versions.sort_by(|a, b| compare_versions_lenient(a, b));
                versions.dedup();
                registry.history.insert(id, versions);
            }
        }
        for (id, nt) in &registry.types {
            let versions = registry.history.entry(id.clone()).or_default();
            if !versions.contains(&nt.version) {
                versions.push(nt.version.clone());
                versions.sort_by(|a, b| compare_versions_lenient(a, b));
            }
        }
        registry
    }

    fn ordered(&self) -> impl Iterator<Item = &NoteType> {
        self.order.iter().filter_map(|id| self.types.get(id))
    }
}

/// Structural validation of a note type definition.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_structure(note_type: &NoteType) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let missing = |path: String| {
        ValidationError::new(ErrorCode::MissingField, format!("missing required field '{}'", path))
            .with_path(path)
    };

    if note_type.id.trim().is_empty() {
        errors.push(missing("id".into()));
    }
    if note_type.name.trim().is_empty() {
        errors.push(missing("name".into()));
    }
    if note_type.version.trim().is_empty() {
        errors.push(missing("version".into()));
    } else if let Err(e) = SemanticVersion::parse(&note_type.version) {
        errors.push(ValidationError::new(ErrorCode::InvalidVersion, e.to_string()).with_path("version"));
    }

    if note_type.properties.is_empty() {
        errors.push(
            ValidationError::new(ErrorCode::MissingField, "note type must define at least one property")
                .with_path("properties"),
        );
    }

    let mut seen = HashSet::new();
    for (i, prop) in note_type.properties.iter().enumerate() {
        let base = format!("properties[{}]", i);
        if prop.key.trim().is_empty() {
            errors.push(missing(format!("{}.key", base)));
        } else if !seen.insert(prop.key.as_str()) {
            errors.push(
                ValidationError::for_property(
                    ErrorCode::DuplicatePropertyKey,
                    prop.key.clone(),
                    format!("property key '{}' is defined more than once", prop.key),
                )
                .with_path(format!("{}.key", base)),
            );
        }
        if prop.name.trim().is_empty() {
            errors.push(missing(format!("{}.name", base)));
        }
        if prop.external_key.trim().is_empty() {
            errors.push(missing(format!("{}.external_key", base)));
        }
        match &prop.rule {
            None => errors.push(missing(format!("{}.rule", base))),
            Some(rule) if !rule.fits(prop.kind) => errors.push(
                ValidationError::for_property(
                    ErrorCode::InvalidField,
                    prop.key.clone(),
                    format!("rule '{}' cannot validate {} values", rule.tag(), prop.kind),
                )
                .with_path(format!("{}.rule", base))
                .with_expected_actual(prop.kind.as_str(), rule.tag()),
            ),
            Some(_) => {}
        }
    }

    match &note_type.template {
        None => errors.push(missing("template".into())),
        Some(template) => {
            if template.version.trim().is_empty() {
                errors.push(missing("template.version".into()));
            }
            if template.content.trim().is_empty() {
                errors.push(missing("template.content".into()));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::definition::TemplateSpec;
    use crate::types::schema::{PropertyDefinition, PropertyKind, SelectOption, ValidationRule};
    use serde_json::json;

    fn make_type(id: &str, version: &str) -> NoteType {
        NoteType::new(id, id.to_uppercase(), version)
            .with_property(PropertyDefinition::new("title", "Title", PropertyKind::Text).required())
            .with_template(TemplateSpec::new("# {{title}}", "1.0.0"))
    }

    #[test]
    fn test_empty_registry() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_none());
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = TypeRegistry::new();
        let result = registry.register(make_type("meeting", "1.0.0"), RegisterOptions::default());

        assert!(result.valid, "{:?}", result.errors);
        assert!(registry.contains("meeting"));
        let resolved = registry.get("meeting").unwrap();
        assert_eq!(resolved.id(), "meeting");
        assert_eq!(resolved.properties().len(), 1);
    }

    #[test]
    fn test_structural_errors_are_collected() {
        let mut bad = NoteType::new("", "", "one");
        let mut prop = PropertyDefinition::new("", "", PropertyKind::Text);
        prop.external_key.clear();
        prop.rule = None;
        bad.properties.push(prop);

        let mut registry = TypeRegistry::new();
        let result = registry.register(bad, RegisterOptions::default());

        assert!(!result.valid);
        let paths: Vec<_> = result.errors.iter().filter_map(|e| e.path.as_deref()).collect();
        assert_eq!(
            paths,
            vec![
                "id",
                "name",
                "version",
                "properties[0].key",
                "properties[0].name",
                "properties[0].external_key",
                "properties[0].rule",
                "template",
            ]
        );
        assert!(result.has_error(ErrorCode::InvalidVersion));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_properties_and_template_fields() {
        let nt = NoteType::new("x", "X", "1.0.0").with_template(TemplateSpec::new("", ""));
        let errors = validate_structure(&nt);
        let paths: Vec<_> = errors.iter().filter_map(|e| e.path.as_deref()).collect();
        assert_eq!(paths, vec!["properties", "template.version", "template.content"]);
    }

    #[test]
    fn test_duplicate_property_key() {
        let nt = make_type("t", "1.0.0")
            .with_property(PropertyDefinition::new("title", "Again", PropertyKind::Text));
        let errors = validate_structure(&nt);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::DuplicatePropertyKey);
    }

    #[test]
    fn test_duplicate_without_overwrite() {
        let mut registry = TypeRegistry::new();
        registry.register(make_type("meeting", "1.0.0"), RegisterOptions::default());

        let result = registry.register(make_type("meeting", "2.0.0"), RegisterOptions::default());
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, ErrorCode::DuplicateNoteType);
        assert_eq!(registry.get("meeting").unwrap().version(), "1.0.0");
    }

    #[test]
    fn test_overwrite_requires_greater_version() {
        let mut registry = TypeRegistry::new();
        registry.register(make_type("task", "1.2.0"), RegisterOptions::default());

        for stale in ["1.2.0", "1.1.9", "0.9.0"] {
            let result = registry.register(make_type("task", stale), RegisterOptions::overwrite());
            assert_eq!(result.errors[0].code, ErrorCode::InvalidVersionUpdate, "{stale}");
        }

        let result = registry.register(make_type("task", "1.10.0"), RegisterOptions::overwrite());
        assert!(result.valid);
        assert_eq!(registry.get("task").unwrap().version(), "1.10.0");
    }

    #[test]
    fn test_history_sorted_by_version_not_string() {
        let mut registry = TypeRegistry::new();
        registry.register(make_type("task", "1.9.0"), RegisterOptions::default());
        registry.register(make_type("task", "1.10.0"), RegisterOptions::overwrite());
        let unchecked = RegisterOptions { check_compatibility: false, ..RegisterOptions::overwrite() };
        registry.register(make_type("task", "1.2.0"), unchecked);

        assert_eq!(
            registry.version_history("task").unwrap(),
            &["1.2.0".to_string(), "1.9.0".to_string(), "1.10.0".to_string()]
        );
    }

    #[test]
    fn test_unregister_drops_history() {
        let mut registry = TypeRegistry::new();
        registry.register(make_type("task", "1.0.0"), RegisterOptions::default());

        assert!(registry.unregister("task").is_some());
        assert!(registry.get("task").is_none());
        assert!(registry.version_history("task").is_none());
        assert!(registry.unregister("task").is_none());
    }

    #[test]
    fn test_get_resolves_select_default() {
        let nt = make_type("task", "1.0.0").with_property(
            PropertyDefinition::new("status", "Status", PropertyKind::Select)
                .with_options(vec![SelectOption::new("open"), SelectOption::new("wip").default_choice()])
                .with_default(json!("open")),
        );
        let mut registry = TypeRegistry::new();
        registry.register(nt, RegisterOptions::default());

        let resolved = registry.get("task").unwrap();
        assert_eq!(resolved.property("status").unwrap().default(), Some(json!("wip")));
    }

    #[test]
    fn test_get_never_trusts_stored_rule() {
        let mut nt = make_type("task", "1.0.0");
        nt.properties.push(PropertyDefinition::new("count", "Count", PropertyKind::Number));
        let mut registry = TypeRegistry::new();
        registry.register(nt, RegisterOptions::default());

        // Simulate a corrupted stored rule surviving a storage round-trip.
        let mut snapshot = registry.snapshot();
        snapshot.note_types[0].properties[1].rule = Some(ValidationRule::Boolean);
        let restored = TypeRegistry::restore(snapshot);

        let resolved = restored.get("task").unwrap();
        assert_eq!(
            resolved.note_type().property("count").unwrap().rule,
            Some(ValidationRule::Number { min: None, max: None, integer: false })
        );
    }

    #[test]
    fn test_filters_are_read_time_views() {
        let mut registry = TypeRegistry::new();
        let mut old = make_type("legacy", "1.0.0");
        old.metadata.deprecated = true;
        old.metadata.category = Some("work".into());
        let mut task = make_type("task", "1.0.0");
        task.metadata.category = Some("work".into());
        task.metadata.tags = vec!["gtd".into()];
        let journal = make_type("journal", "1.0.0");

        let result = registry.register(old, RegisterOptions::default());
        assert_eq!(result.warnings.len(), 1);
        registry.register(task, RegisterOptions::default());
        registry.register(journal, RegisterOptions::default());

        let ids = |filter: TypeFilter| -> Vec<String> {
            registry.get_all(&filter).iter().map(|r| r.id().to_string()).collect()
        };
        assert_eq!(ids(TypeFilter::all()), vec!["legacy", "task", "journal"]);
        assert_eq!(ids(TypeFilter::all().active_only()), vec!["task", "journal"]);
        assert_eq!(ids(TypeFilter::all().in_category("work")), vec!["legacy", "task"]);
        assert_eq!(ids(TypeFilter::all().tagged("gtd")), vec!["task"]);

        let summaries = registry.get_all_metadata(&TypeFilter::all().active_only());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].property_count, 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_snapshot_restore_preserves_order_and_history() {
        let mut registry = TypeRegistry::new();
        registry.register(make_type("b", "1.0.0"), RegisterOptions::default());
        registry.register(make_type("a", "1.0.0"), RegisterOptions::default());
        registry.register(make_type("b", "1.1.0"), RegisterOptions::overwrite());

        let yaml = serde_yaml::to_string(&registry.snapshot()).unwrap();
        let restored = TypeRegistry::restore(serde_yaml::from_str(&yaml).unwrap());

        assert_eq!(restored.ids().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(
            restored.version_history("b").unwrap(),
            &["1.0.0".to_string(), "1.1.0".to_string()]
        );
    }
}
