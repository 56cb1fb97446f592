use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use super::{
    BackupProvider, MigrationContext, MigrationError, MigrationRecord, ProgressCallback,
    SchemaMigration,
};
use crate::types::TypeRegistry;
use crate::version::compare_versions_lenient;

/// Runs registered migrations at most once each and keeps the ledger.
///
/// A migration id moves from pending to executed exactly once; a failed
/// migration stays in the ledger and is never retried automatically.
pub struct SchemaMigrationManager {
    migrations: Vec<Arc<dyn SchemaMigration>>,
    ledger: Vec<MigrationRecord>,
    backup: Arc<dyn BackupProvider>,
    progress: Option<ProgressCallback>,
}

impl SchemaMigrationManager {
    pub fn new(backup: Arc<dyn BackupProvider>) -> Self {
        Self { migrations: vec![], ledger: vec![], backup, progress: None }
    }

    /// Restore a previously persisted ledger.
    pub fn with_ledger(mut self, records: Vec<MigrationRecord>) -> Self {
        self.ledger = records;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn register_migration(&mut self, migration: Arc<dyn SchemaMigration>) -> Result<(), MigrationError> {
        if self.migrations.iter().any(|m| m.id() == migration.id()) {
            return Err(MigrationError::DuplicateMigration(migration.id().to_string()));
        }
        self.migrations.push(migration);
        Ok(())
    }

    pub fn migrations(&self) -> &[Arc<dyn SchemaMigration>] {
        &self.migrations
    }

    pub fn ledger(&self) -> &[MigrationRecord] {
        &self.ledger
    }

    pub fn is_executed(&self, id: &str) -> bool {
        self.ledger.iter().any(|r| r.id == id)
    }

    /// Unexecuted migrations that report work to do, in version order.
    pub fn get_pending_migrations(&self, registry: &TypeRegistry) -> Vec<Arc<dyn SchemaMigration>> {
        let mut pending: Vec<_> = self
            .migrations
            .iter()
            .filter(|m| !self.is_executed(m.id()) && m.needs_migration(registry))
            .cloned()
            .collect();
        pending.sort_by(|a, b| compare_versions_lenient(a.version(), b.version()));
        pending
    }

    /// Execute one migration and append its record to the ledger.
    ///
    /// The record is appended whether the migration succeeds, reports
    /// per-document errors, or fails outright; an outright failure is then
    /// returned as [`MigrationError::ExecutionFailed`].
    pub async fn execute_migration(
        &mut self,
        registry: &mut TypeRegistry,
        id: &str,
    ) -> Result<MigrationRecord, MigrationError> {
        let migration = self
            .migrations
            .iter()
            .find(|m| m.id() == id)
            .cloned()
            .ok_or_else(|| MigrationError::UnknownMigration(id.to_string()))?;

        if self.is_executed(id) {
            return Err(MigrationError::AlreadyExecuted(id.to_string()));
        }

        info!(%id, version = migration.version(), "running migration");
        let started = Instant::now();
        let executed_at = Utc::now();

        let outcome = {
            let mut ctx =
                MigrationContext::new(id, registry, self.backup.as_ref(), self.progress.clone());
            migration.execute(&mut ctx).await
        };

        let mut record = MigrationRecord {
            id: id.to_string(),
            version: migration.version().to_string(),
            description: migration.description().to_string(),
            executed_at,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            files_affected: 0,
            success: false,
            errors: vec![],
        };

        match outcome {
            Ok(outcome) => {
                record.success = outcome.success();
                record.files_affected = outcome.files_affected;
                record.errors = outcome.errors;
                if record.success {
                    info!(%id, files = record.files_affected, "migration completed");
                } else {
                    warn!(%id, files = record.files_affected, errors = record.errors.len(), "migration completed with errors");
                }
                self.ledger.push(record.clone());
                Ok(record)
            }
            Err(e) => {
                warn!(%id, error = %e, "migration failed");
                record.errors = vec![e.to_string()];
                self.ledger.push(record);
                Err(MigrationError::ExecutionFailed { id: id.to_string(), message: e.to_string() })
            }
        }
    }

    /// Execute every pending migration in version order.
    ///
    /// Stops at the first migration that fails outright; migrations that
    /// merely report per-document errors do not stop the run.
    pub async fn execute_all_pending(
        &mut self,
        registry: &mut TypeRegistry,
    ) -> Result<Vec<MigrationRecord>, MigrationError> {
        let pending = self.get_pending_migrations(registry);
        let mut records = Vec::with_capacity(pending.len());
        for migration in pending {
            records.push(self.execute_migration(registry, migration.id()).await?);
        }
        Ok(records)
    }

    /// Execute the pending migrations marked for unattended runs.
    pub async fn run_auto_migrations(
        &mut self,
        registry: &mut TypeRegistry,
    ) -> Result<Vec<MigrationRecord>, MigrationError> {
        let pending: Vec<_> =
            self.get_pending_migrations(registry).into_iter().filter(|m| m.auto_run()).collect();
        let mut records = Vec::with_capacity(pending.len());
        for migration in pending {
            records.push(self.execute_migration(registry, migration.id()).await?);
        }
        Ok(records)
    }
}
