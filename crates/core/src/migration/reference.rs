//! Converts reference-like properties into association properties.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    BackupOptions, BulkApplier, BulkOptions, MigrationContext, MigrationError, MigrationOutcome,
    RewritePlan, SchemaMigration,
};
use crate::header::{extract_header, patch_header_values};
use crate::store::{DocumentStore, HeaderFields, find_documents};
use crate::types::{
    AssociationConfig, NoteType, PropertyDefinition, PropertyKind, RegisterOptions, TypeFilter,
    TypeRegistry, ValidationRule,
};
use crate::version::SemanticVersion;

/// Ledger id of [`ReferenceConversionMigration`].
pub const REFERENCE_CONVERSION_ID: &str = "convert-reference-properties";

/// Turns properties flagged as links, but not typed as associations, into
/// association properties.
///
/// The change is schema-only: the affected note types are re-registered one
/// minor version up, and documents claiming them are only rewritten when a
/// value's shape does not fit the new multiplicity (a bare value for a list
/// property, a one-item list for a single reference). When a note type whose
/// id equals the property key is registered, it becomes the association
/// target.
pub struct ReferenceConversionMigration {
    store: Arc<dyn DocumentStore>,
    applier: Arc<dyn BulkApplier>,
    folder: PathBuf,
    fields: HeaderFields,
    options: BulkOptions,
    auto_run: bool,
}

impl ReferenceConversionMigration {
    pub fn new(store: Arc<dyn DocumentStore>, applier: Arc<dyn BulkApplier>) -> Self {
        Self {
            store,
            applier,
            folder: PathBuf::new(),
            fields: HeaderFields::default(),
            options: BulkOptions::default(),
            auto_run: false,
        }
    }

    /// Only look for documents below this store folder.
    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_header_fields(mut self, fields: HeaderFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_bulk_options(mut self, options: BulkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_auto_run(mut self, auto_run: bool) -> Self {
        self.auto_run = auto_run;
        self
    }
}

fn candidates(registry: &TypeRegistry) -> Vec<NoteType> {
    registry
        .get_all(&TypeFilter::all())
        .into_iter()
        .map(|resolved| resolved.into_note_type())
        .filter(|nt| nt.properties.iter().any(PropertyDefinition::is_unconverted_reference))
        .collect()
}

#[async_trait]
impl SchemaMigration for ReferenceConversionMigration {
    fn id(&self) -> &str {
        REFERENCE_CONVERSION_ID
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Convert link-flagged properties into association properties"
    }

    fn auto_run(&self) -> bool {
        self.auto_run
    }

    fn needs_migration(&self, registry: &TypeRegistry) -> bool {
        !candidates(registry).is_empty()
    }

    async fn execute(&self, ctx: &mut MigrationContext<'_>) -> Result<MigrationOutcome, MigrationError> {
        let mut outcome = MigrationOutcome::default();
        let affected = candidates(ctx.registry);
        if affected.is_empty() {
            return Ok(outcome);
        }

        let backup = ctx
            .backup
            .backup_registry(&ctx.registry.snapshot(), &BackupOptions::labelled(ctx.migration_id()))
            .await;
        if !backup.success {
            return Err(MigrationError::Backup(backup.errors.join("; ")));
        }

        let mut batches = Vec::with_capacity(affected.len());
        for note_type in affected {
            let updated = match converted(&note_type, ctx.registry) {
                Ok(updated) => updated,
                Err(message) => {
                    outcome.errors.push(format!("{}: {}", note_type.id, message));
                    continue;
                }
            };
            let paths = find_documents(
                self.store.as_ref(),
                &self.folder,
                &note_type.id,
                Some(note_type.version.as_str()),
                &self.fields,
            )
            .await?;
            debug!(note_type = %note_type.id, documents = paths.len(), "located documents to convert");
            batches.push((note_type, updated, paths));
        }

        let total: usize = batches.iter().map(|(_, _, paths)| paths.len()).sum();
        let mut processed = 0;
        ctx.report(processed, total, None);

        for (original, updated, paths) in batches {
            let plan = rewrite_plan(&original);
            let applied = self.applier.apply(&paths, &plan, &self.options).await?;

            processed += paths.len();
            outcome.files_affected += applied.successful_files.len();
            outcome.errors.extend(applied.errors.iter().map(ToString::to_string));
            ctx.report(processed, total, Some(original.id.as_str()));

            let version = updated.version.clone();
            let registered = ctx.registry.register(
                updated,
                RegisterOptions { allow_overwrite: true, validate: false, check_compatibility: true },
            );
            outcome
                .errors
                .extend(registered.errors.iter().map(|e| format!("{}: {}", original.id, e)));
            info!(
                note_type = %original.id,
                from = %original.version,
                to = %version,
                documents = applied.successful_files.len(),
                "converted reference properties"
            );
        }

        Ok(outcome)
    }
}

/// The note type with every unconverted reference turned into an
/// association, one minor version up.
fn converted(note_type: &NoteType, registry: &TypeRegistry) -> Result<NoteType, String> {
    let version = SemanticVersion::parse(&note_type.version).map_err(|e| e.to_string())?;
    let mut updated = note_type.clone();
    updated.version = version
        .bump_minor()
        .ok_or_else(|| format!("version {} cannot be raised", version))?
        .to_string();

    for prop in updated.properties.iter_mut().filter(|p| p.is_unconverted_reference()) {
        let multiple = prop.kind == PropertyKind::List;
        let target_type = registry.contains(&prop.key).then(|| prop.key.clone());
        prop.kind = PropertyKind::Association;
        prop.association = Some(AssociationConfig { target_type, multiple, allow_create: false });
        prop.rule = Some(ValidationRule::Association { multiple });
        prop.transform = None;
    }

    Ok(updated)
}

fn rewrite_plan(original: &NoteType) -> RewritePlan {
    let conversions: Vec<(String, String, bool)> = original
        .properties
        .iter()
        .filter(|p| p.is_unconverted_reference())
        .map(|p| (p.external_key.clone(), p.key.clone(), p.kind == PropertyKind::List))
        .collect();

    RewritePlan::new(move |_, content| {
        let header = extract_header(content).map_err(|e| e.to_string())?.header;
        let slots: Vec<(&str, bool)> = conversions
            .iter()
            .map(|(external_key, key, multiple)| {
                let slot = if header.contains_key(external_key) { external_key } else { key };
                (slot.as_str(), *multiple)
            })
            .collect();

        patch_header_values(content, |key, value| {
            let (_, multiple) = slots.iter().find(|(slot, _)| *slot == key)?;
            reshape(value, *multiple)
        })
        .map_err(|e| e.to_string())
    })
}

/// The value in the shape an association of the given multiplicity
/// accepts, or `None` when it already fits.
///
/// Reference text itself is never rewritten: plain and `[[wiki]]` targets are
/// both valid association values.
fn reshape(value: &Value, multiple: bool) -> Option<Value> {
    match (value, multiple) {
        (Value::String(s), true) if !s.trim().is_empty() => Some(Value::Array(vec![value.clone()])),
        (Value::Array(items), false) if items.len() == 1 && items[0].is_string() => Some(items[0].clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    #[test]
    fn test_reshape() {
        assert_eq!(reshape(&json!("Alpha"), false), None);
        assert_eq!(reshape(&json!("[[Alpha]]"), false), None);
        assert_eq!(reshape(&json!("Alpha"), true), Some(json!(["Alpha"])));
        assert_eq!(reshape(&json!(["a", "b"]), true), None);
        assert_eq!(reshape(&json!(["a"]), false), Some(json!("a")));
        assert_eq!(reshape(&json!(3), false), None);
        assert_eq!(reshape(&json!("  "), true), None);
    }

    #[test]
    fn test_converted_type() {
        let mut registry = TypeRegistry::new();
        let _ = registry.register(NoteType::new("project", "Project", "1.0.0"), RegisterOptions::default());

        let task = NoteType::new("task", "Task", "1.2.3")
            .with_property(PropertyDefinition::new("project", "Project", PropertyKind::Text).linked())
            .with_property(PropertyDefinition::new("people", "People", PropertyKind::List).linked())
            .with_property(PropertyDefinition::new("title", "Title", PropertyKind::Text));

        let updated = converted(&task, &registry).unwrap();
        assert_eq!(updated.version, "1.3.0");

        let project = updated.property("project").unwrap();
        assert_eq!(project.kind, PropertyKind::Association);
        assert_eq!(project.association.as_ref().unwrap().target_type.as_deref(), Some("project"));
        assert!(!project.association.as_ref().unwrap().multiple);

        let people = updated.property("people").unwrap();
        assert!(people.association.as_ref().unwrap().multiple);
        assert!(people.association.as_ref().unwrap().target_type.is_none());

        assert_eq!(updated.property("title").unwrap().kind, PropertyKind::Text);
    }

    #[test]
    fn test_rewrite_plan_only_touches_misshapen_values() {
        let task = NoteType::new("task", "Task", "1.0.0")
            .with_property(PropertyDefinition::new("project", "Project", PropertyKind::Text).linked())
            .with_property(
                PropertyDefinition::new("people", "People", PropertyKind::List)
                    .with_external_key("People")
                    .linked(),
            );
        let plan = rewrite_plan(&task);

        let fitting = "---\ntype: task\ntype_version: 1.0.0\nproject: Alpha\nPeople: [ann, bob]\n---\nBody\n";
        assert_eq!(plan.rewrite(Path::new("a.md"), fitting).unwrap(), None);

        let bare = "---\ntype: task\nPeople: ann\n---\nBody\n";
        let rewritten = plan.rewrite(Path::new("b.md"), bare).unwrap().unwrap();
        assert_eq!(rewritten, "---\ntype: task\nPeople: [ann]\n---\nBody\n");
        assert_eq!(plan.rewrite(Path::new("b.md"), &rewritten).unwrap(), None);

        assert!(plan.rewrite(Path::new("c.md"), "---\ntags: [x\n---\n").is_err());
    }

    #[test]
    fn test_rewrite_plan_keeps_comments_and_block_lists() {
        let task = NoteType::new("task", "Task", "1.0.0")
            .with_property(PropertyDefinition::new("people", "People", PropertyKind::List).linked());
        let plan = rewrite_plan(&task);

        let content = "---\ntype: task\n# keep me\nsingle: 'it''s'\naliases:\n  - first\n  - second\npeople: ann\n---\nBody\n";
        let rewritten = plan.rewrite(Path::new("d.md"), content).unwrap().unwrap();
        assert_eq!(
            rewritten,
            "---\ntype: task\n# keep me\nsingle: 'it''s'\naliases:\n  - first\n  - second\npeople: [ann]\n---\nBody\n"
        );
    }
}
