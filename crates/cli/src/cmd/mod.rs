//! Subcommands and the state they share.

pub mod detect;
pub mod doctor;
pub mod migrate;
pub mod register;
pub mod types;
pub mod unregister;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use color_eyre::eyre::{Result, WrapErr};
use schemata_core::cache::{JsonFileCache, TypeCache};
use schemata_core::config::{ConfigLoader, ResolvedConfig};
use schemata_core::migration::{
    FileBackupProvider, MigrationProgress, MigrationRecord, ReferenceConversionMigration,
    SchemaMigrationManager, StoreBulkApplier,
};
use schemata_core::state::StateFile;
use schemata_core::store::{DocumentStore, FsDocumentStore};
use schemata_core::types::TypeRegistry;
use tracing::{info, warn};

use crate::logging;

/// Configuration plus the persisted registry and migration ledger.
pub struct Session {
    pub config: ResolvedConfig,
    pub registry: TypeRegistry,
    pub ledger: Vec<MigrationRecord>,
    /// Read-through view of the registry used while processing documents.
    pub cache: Option<Mutex<TypeCache>>,
    pub store: Arc<dyn DocumentStore>,
}

impl Session {
    /// Load config, start logging and read persisted state.
    ///
    /// When `migrations.auto_run` is set, pending auto-run migrations are
    /// executed before returning.
    pub async fn open(config: Option<&Path>, root: Option<&Path>) -> Result<Self> {
        let config = ConfigLoader::load(config, root).wrap_err("failed to load configuration")?;
        logging::init(&config)?;

        let (registry, ledger) = StateFile::load(&config.state_file)?.into_parts();
        let cache = config.cache.enabled.then(|| {
            Mutex::new(
                TypeCache::new(config.cache_options())
                    .with_persistence(Box::new(JsonFileCache::new(&config.cache.file))),
            )
        });
        let store: Arc<dyn DocumentStore> =
            Arc::new(FsDocumentStore::new(&config.root).with_extension(&config.extension));

        let mut session = Self { config, registry, ledger, cache, store };
        if session.config.migrations.auto_run {
            session.run_auto_migrations().await?;
        }
        Ok(session)
    }

    pub fn save(&self) -> Result<()> {
        StateFile::capture(&self.registry, &self.ledger)
            .save(&self.config.state_file)
            .wrap_err("failed to save state")
    }

    pub fn cache_mut(&mut self) -> Option<&mut TypeCache> {
        self.cache.as_mut().map(|cache| cache.get_mut().unwrap_or_else(PoisonError::into_inner))
    }

    /// A manager holding every known migration and the current ledger.
    pub fn migration_manager(&self) -> Result<SchemaMigrationManager> {
        let backup = Arc::new(FileBackupProvider::new(&self.config.migrations.backup_dir));
        let applier = Arc::new(StoreBulkApplier::new(self.store.clone()));

        let mut manager = SchemaMigrationManager::new(backup)
            .with_ledger(self.ledger.clone())
            .with_progress(Arc::new(|p: &MigrationProgress| {
                info!(
                    migration = %p.migration_id,
                    processed = p.processed,
                    total = p.total,
                    current = p.current.as_deref().unwrap_or(""),
                    "migration progress"
                );
            }));

        manager.register_migration(Arc::new(
            ReferenceConversionMigration::new(self.store.clone(), applier)
                .with_header_fields(self.config.header_fields())
                .with_bulk_options(self.config.bulk_options())
                .with_auto_run(true),
        ))?;
        Ok(manager)
    }

    /// Take over the manager's ledger and drop cached types, which a
    /// migration may have rewritten.
    pub fn absorb(&mut self, manager: &SchemaMigrationManager) {
        self.ledger = manager.ledger().to_vec();
        if let Some(cache) = self.cache_mut() {
            cache.clear();
        }
    }

    async fn run_auto_migrations(&mut self) -> Result<()> {
        let mut manager = self.migration_manager()?;
        let result = manager.run_auto_migrations(&mut self.registry).await;
        let ran = manager.ledger().len() != self.ledger.len();
        self.absorb(&manager);
        if ran {
            self.save()?;
        }
        match result {
            Ok(records) => {
                for record in records.iter().filter(|r| !r.success) {
                    warn!(id = %record.id, errors = record.errors.len(), "auto migration reported errors");
                }
                Ok(())
            }
            Err(e) => Err(e).wrap_err("auto migration failed"),
        }
    }

    /// A user-supplied path resolved against the document root, and the same
    /// path relative to the root.
    pub fn locate(&self, path: &Path) -> (PathBuf, PathBuf) {
        if path.is_absolute() {
            let relative = path.strip_prefix(&self.config.root).unwrap_or(path).to_path_buf();
            (path.to_path_buf(), relative)
        } else {
            (self.config.root.join(path), path.to_path_buf())
        }
    }
}
