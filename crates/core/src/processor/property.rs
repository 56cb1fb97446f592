//! Property validation, defaulting and transformation against a note type.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::rules::{ConditionalRule, DependencyRule};
use crate::error::CollaboratorResult;
use crate::types::{
    ErrorCode, NoteType, PropertyAccessor, PropertyDefinition, PropertyKind, PropertyMap,
    ValidationError, ValidationResult, ValidationWarning, WarningCode,
};

/// Host-supplied check that references point at existing documents.
#[async_trait]
pub trait AssociationValidator: Send + Sync {
    async fn validate_references(
        &self,
        target_type: &str,
        references: &[String],
    ) -> CollaboratorResult<ValidationResult>;
}

/// Options controlling [`PropertyProcessor::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    pub apply_transformations: bool,
    pub use_defaults: bool,
    pub validate_required: bool,
    pub run_conditional_validation: bool,
    pub resolve_dependencies: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            apply_transformations: true,
            use_defaults: true,
            validate_required: true,
            run_conditional_validation: true,
            resolve_dependencies: true,
        }
    }
}

/// Outcome of processing a raw property bag.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProcessResult {
    pub valid: bool,
    /// Processed values keyed by logical property key.
    pub properties: PropertyMap,
    /// Keys whose value went through a transform.
    pub transformed: Vec<String>,
    /// Keys filled from a default.
    pub defaulted: Vec<String>,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// Validates, defaults, transforms and cross-validates property values.
///
/// Dependency and conditional rules live on the instance: a new processor
/// starts with no rules, and callers needing isolated rule sets must use
/// separate instances.
#[derive(Default)]
pub struct PropertyProcessor {
    dependencies: Vec<DependencyRule>,
    conditionals: Vec<ConditionalRule>,
    association_validator: Option<Arc<dyn AssociationValidator>>,
}

impl std::fmt::Debug for PropertyProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyProcessor")
            .field("dependencies", &self.dependencies)
            .field("conditionals", &self.conditionals)
            .field("association_validator", &self.association_validator.is_some())
            .finish()
    }
}

impl PropertyProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_association_validator(mut self, validator: Arc<dyn AssociationValidator>) -> Self {
        self.association_validator = Some(validator);
        self
    }

    pub fn set_association_validator(&mut self, validator: Option<Arc<dyn AssociationValidator>>) {
        self.association_validator = validator;
    }

    pub fn register_dependency(&mut self, rule: DependencyRule) {
        self.dependencies.push(rule);
    }

    pub fn register_conditional_validation(&mut self, rule: ConditionalRule) {
        self.conditionals.push(rule);
    }

    /// Drop every registered dependency and conditional rule.
    pub fn clear(&mut self) {
        self.dependencies.clear();
        self.conditionals.clear();
    }

    pub fn rule_count(&self) -> usize {
        self.dependencies.len() + self.conditionals.len()
    }

    /// Process raw values (keyed by external key) against a note type.
    ///
    /// Per-property errors end processing before any business rule runs, so
    /// dependency, conditional, association and cross-property checks only
    /// ever see well-formed values.
    pub async fn process(
        &self,
        note_type: &NoteType,
        raw: &PropertyMap,
        options: &ProcessOptions,
    ) -> ProcessResult {
        let mut result = ProcessResult::default();

        for def in &note_type.properties {
            self.base_pass(def, raw, options, &mut result);
        }

        if !result.errors.is_empty() {
            debug!(
                note_type = %note_type.id,
                errors = result.errors.len(),
                "property validation failed, skipping business rules"
            );
            result.valid = false;
            return result;
        }

        if options.resolve_dependencies {
            self.check_dependencies(note_type, &mut result);
        }

        if options.run_conditional_validation {
            self.check_conditionals(note_type, &mut result);
        }

        if let Some(validator) = &self.association_validator {
            check_associations(validator.as_ref(), note_type, &mut result).await;
        }

        if let Some(cross) = &note_type.cross_validator {
            let errors = cross(&result.properties);
            result.errors.extend(errors.into_iter().map(|mut e| {
                if e.path.is_none() {
                    e.path = Some(note_type.id.clone());
                }
                e
            }));
        }

        result.valid = result.errors.is_empty();
        result
    }

    fn base_pass(
        &self,
        def: &PropertyDefinition,
        raw: &PropertyMap,
        options: &ProcessOptions,
        result: &mut ProcessResult,
    ) {
        let key = def.key.clone();
        let value = raw
            .get(&def.external_key)
            .or_else(|| raw.get(&def.key))
            .filter(|v| !v.is_null());

        let Some(value) = value else {
            let default = PropertyAccessor::new(def).default();
            if options.use_defaults
                && let Some(default) = default
            {
                result.properties.insert(key.clone(), default);
                result.defaulted.push(key);
            } else if def.required && options.validate_required {
                result.errors.push(
                    ValidationError::for_property(
                        ErrorCode::RequiredPropertyMissing,
                        key,
                        format!("required property '{}' is missing", def.name),
                    )
                    .with_path(def.external_key.clone()),
                );
            }
            return;
        };

        let rule = def.effective_rule();
        if let Err(errors) = rule.check(&key, value) {
            result.errors.extend(errors);
            return;
        }

        // A transformed value must still pass the rule, or a second pass
        // would reject what the first one produced.
        let value = match (&def.transform, options.apply_transformations) {
            (Some(transform), true) => match transform.apply(value) {
                Ok(v) if rule.check(&key, &v).is_ok() => {
                    result.transformed.push(key.clone());
                    v
                }
                Ok(_) => {
                    result.warnings.push(
                        ValidationWarning::new(
                            WarningCode::TransformDropped,
                            format!(
                                "transform '{}' output does not satisfy the {} rule; value kept as given",
                                transform.name(),
                                rule.tag()
                            ),
                        )
                        .with_property(key.clone()),
                    );
                    value.clone()
                }
                Err(message) => {
                    result.errors.push(ValidationError::for_property(
                        ErrorCode::TransformationError,
                        key,
                        format!("transform '{}' failed: {}", transform.name(), message),
                    ));
                    return;
                }
            },
            _ => value.clone(),
        };

        result.properties.insert(key, value);
    }

    fn check_dependencies(&self, note_type: &NoteType, result: &mut ProcessResult) {
        for rule in &self.dependencies {
            if note_type.property(&rule.property_key).is_none() {
                continue;
            }
            let deps: PropertyMap = rule
                .depends_on
                .iter()
                .filter_map(|k| result.properties.get(k).map(|v| (k.clone(), v.clone())))
                .collect();

            if let Err(message) = rule.run(result.properties.get(&rule.property_key), &deps) {
                result.errors.push(ValidationError::for_property(
                    ErrorCode::DependencyViolation,
                    rule.property_key.clone(),
                    message,
                ));
            }
        }
    }

    fn check_conditionals(&self, note_type: &NoteType, result: &mut ProcessResult) {
        for rule in &self.conditionals {
            if note_type.property(&rule.property_key).is_none() || !rule.applies(&result.properties)
            {
                continue;
            }
            if let Err(message) = rule.run(result.properties.get(&rule.property_key), &result.properties)
            {
                result.errors.push(ValidationError::for_property(
                    ErrorCode::ConditionalViolation,
                    rule.property_key.clone(),
                    message,
                ));
            }
        }
    }
}

async fn check_associations(
    validator: &dyn AssociationValidator,
    note_type: &NoteType,
    result: &mut ProcessResult,
) {
    for def in note_type.properties.iter().filter(|d| d.kind == PropertyKind::Association) {
        let Some(value) = result.properties.get(&def.key) else {
            continue;
        };
        let references = normalize_references(value);
        if references.is_empty() {
            continue;
        }

        let config = def.association.clone().unwrap_or_default();
        if !config.multiple && references.len() > 1 {
            result.errors.push(ValidationError::for_property(
                ErrorCode::AssociationInvalid,
                def.key.clone(),
                format!("expects a single reference, got {}", references.len()),
            ));
            continue;
        }

        let Some(target) = config.target_type.as_deref() else {
            result.warnings.push(
                ValidationWarning::new(
                    WarningCode::AssociationTargetMissing,
                    format!("association '{}' has no target note type; references not checked", def.key),
                )
                .with_property(def.key.clone()),
            );
            continue;
        };

        match validator.validate_references(target, &references).await {
            Ok(outcome) => {
                for mut err in outcome.errors {
                    if err.property.is_none() {
                        err.property = Some(def.key.clone());
                    }
                    result.errors.push(err);
                }
                result.warnings.extend(outcome.warnings);
            }
            Err(e) => {
                warn!(property = %def.key, target_type = target, error = %e, "association validator failed");
                result.errors.push(ValidationError::for_property(
                    ErrorCode::AssociationInvalid,
                    def.key.clone(),
                    format!("could not validate references: {}", e),
                ));
            }
        }
    }
}

/// Normalize an association value into a list of reference targets.
///
/// Wiki-style `[[target|alias]]` references are reduced to `target`.
pub fn normalize_references(value: &Value) -> Vec<String> {
    let items: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => vec![],
    };

    items
        .into_iter()
        .map(|s| {
            let s = s.trim();
            let inner = s.strip_prefix("[[").and_then(|r| r.strip_suffix("]]")).unwrap_or(s);
            inner.split('|').next().unwrap_or(inner).trim().to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}
