use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheOptions;
use crate::migration::BulkOptions;
use crate::store::HeaderFields;

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct DocumentsConfig {
    pub root: String,
    /// Header field naming the note type.
    #[serde(default = "default_type_field")]
    pub type_field: String,
    /// Header field recording the schema version.
    #[serde(default = "default_version_field")]
    pub version_field: String,
    /// Extension of document files, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    /// Where registered note types and the migration ledger are kept.
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { state_file: default_state_file() }
    }
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_file")]
    pub file: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: default_cache_file(),
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MigrationsConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_true")]
    pub continue_on_errors: bool,
    #[serde(default = "default_true")]
    pub create_backups: bool,
    #[serde(default = "default_true")]
    pub validate_after_migration: bool,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    /// Run auto-run migrations before every command.
    #[serde(default)]
    pub auto_run: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            continue_on_errors: true,
            create_backups: true,
            validate_after_migration: true,
            backup_dir: default_backup_dir(),
            auto_run: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_level: None, file: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_type_field() -> String {
    crate::processor::DEFAULT_TYPE_FIELD.to_string()
}

fn default_version_field() -> String {
    crate::store::DEFAULT_VERSION_FIELD.to_string()
}

fn default_extension() -> String {
    "md".to_string()
}

fn default_state_file() -> String {
    "{{root}}/.schemata/state.yaml".to_string()
}

fn default_cache_file() -> String {
    "{{root}}/.schemata/cache.json".to_string()
}

fn default_backup_dir() -> String {
    "{{root}}/.schemata/backups".to_string()
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_capacity() -> usize {
    256
}

fn default_max_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct ResolvedCache {
    pub enabled: bool,
    pub file: PathBuf,
    pub ttl: Duration,
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedMigrations {
    pub max_concurrency: usize,
    pub continue_on_errors: bool,
    pub create_backups: bool,
    pub validate_after_migration: bool,
    pub backup_dir: PathBuf,
    pub auto_run: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The file this configuration was loaded from.
    pub config_path: PathBuf,
    pub root: PathBuf,
    pub type_field: String,
    pub version_field: String,
    pub extension: String,
    pub state_file: PathBuf,
    pub cache: ResolvedCache,
    pub migrations: ResolvedMigrations,
    pub logging: LoggingConfig,
}

impl ResolvedConfig {
    pub fn header_fields(&self) -> HeaderFields {
        HeaderFields { type_field: self.type_field.clone(), version_field: self.version_field.clone() }
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions { ttl: Some(self.cache.ttl), capacity: self.cache.capacity }
    }

    pub fn bulk_options(&self) -> BulkOptions {
        BulkOptions {
            max_concurrency: self.migrations.max_concurrency,
            continue_on_errors: self.migrations.continue_on_errors,
            create_backups: self.migrations.create_backups,
            validate_after_migration: self.migrations.validate_after_migration,
        }
    }
}
