//! Schema migrations: versioned, run-once changes to note types and the
//! documents using them.

pub mod backup;
pub mod bulk;
mod manager;
mod reference;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CollaboratorError;
use crate::types::TypeRegistry;

pub use backup::{BackupOptions, BackupOutcome, BackupProvider, FileBackupProvider};
pub use bulk::{BulkApplier, BulkOptions, BulkOutcome, DocumentError, RewritePlan, StoreBulkApplier};
pub use manager::SchemaMigrationManager;
pub use reference::{REFERENCE_CONVERSION_ID, ReferenceConversionMigration};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration not registered: {0}")]
    UnknownMigration(String),

    #[error("migration already registered: {0}")]
    DuplicateMigration(String),

    #[error("migration '{0}' has already been executed")]
    AlreadyExecuted(String),

    #[error("registry backup failed: {0}")]
    Backup(String),

    #[error("migration '{id}' failed: {message}")]
    ExecutionFailed { id: String, message: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Progress of a running migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationProgress {
    pub migration_id: String,
    pub processed: usize,
    pub total: usize,
    pub current: Option<String>,
}

pub type ProgressCallback = Arc<dyn Fn(&MigrationProgress) + Send + Sync>;

/// Ledger entry for an executed migration, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: String,
    pub version: String,
    pub description: String,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub files_affected: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// What a migration did.
///
/// Per-document errors do not make the migration throw; they land here and
/// mark the ledger record unsuccessful.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub files_affected: usize,
    pub errors: Vec<String>,
}

impl MigrationOutcome {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What a migration can reach while it runs.
pub struct MigrationContext<'a> {
    pub registry: &'a mut TypeRegistry,
    pub backup: &'a dyn BackupProvider,
    migration_id: String,
    progress: Option<ProgressCallback>,
}

impl<'a> MigrationContext<'a> {
    pub fn new(
        migration_id: impl Into<String>,
        registry: &'a mut TypeRegistry,
        backup: &'a dyn BackupProvider,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self { registry, backup, migration_id: migration_id.into(), progress }
    }

    pub fn migration_id(&self) -> &str {
        &self.migration_id
    }

    /// Report progress, tagged with the running migration's id.
    pub fn report(&self, processed: usize, total: usize, current: Option<&str>) {
        if let Some(progress) = &self.progress {
            progress(&MigrationProgress {
                migration_id: self.migration_id.clone(),
                processed,
                total,
                current: current.map(str::to_string),
            });
        }
    }
}

#[async_trait]
pub trait SchemaMigration: Send + Sync {
    fn id(&self) -> &str;

    /// Version-comparable string ordering pending migrations.
    fn version(&self) -> &str;

    fn description(&self) -> &str;

    /// Whether the migration may run unattended at startup.
    fn auto_run(&self) -> bool {
        false
    }

    fn needs_migration(&self, registry: &TypeRegistry) -> bool;

    async fn execute(&self, ctx: &mut MigrationContext<'_>) -> Result<MigrationOutcome, MigrationError>;
}
