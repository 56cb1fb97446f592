use crate::config::types::{ConfigFile, LoggingConfig, ResolvedCache, ResolvedConfig, ResolvedMigrations};
use shellexpand::full;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use dirs::home_dir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(String),

    #[error("failed to read config file {0}: {1}")]
    ReadError(String, #[source] std::io::Error),

    #[error("failed to parse TOML in {0}: {1}")]
    ParseError(String, #[source] toml::de::Error),

    #[error("version {0} is unsupported (expected 1)")]
    BadVersion(u32),

    #[error("home directory not available to expand '~'")]
    NoHome,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and resolve the configuration.
    ///
    /// `root_override` replaces `[documents].root` before any `{{root}}`
    /// substitution.
    pub fn load(
        config_path: Option<&Path>,
        root_override: Option<&Path>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let s = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e))?;

        let cf: ConfigFile = toml::from_str(&s)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e))?;

        if cf.version != 1 {
            return Err(ConfigError::BadVersion(cf.version));
        }

        Self::resolve(path, cf, root_override)
    }

    fn resolve(
        config_path: PathBuf,
        cf: ConfigFile,
        root_override: Option<&Path>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let root = match root_override {
            Some(root) => root.to_path_buf(),
            None => expand_path(&cf.documents.root)?,
        };
        let sub = |s: &str| s.replace("{{root}}", &root.to_string_lossy());

        require_non_empty("documents.type_field", &cf.documents.type_field)?;
        require_non_empty("documents.version_field", &cf.documents.version_field)?;
        require_non_empty("documents.extension", &cf.documents.extension)?;
        if cf.cache.capacity == 0 {
            return Err(invalid("cache.capacity", "must be at least 1"));
        }
        if cf.migrations.max_concurrency == 0 {
            return Err(invalid("migrations.max_concurrency", "must be at least 1"));
        }

        let state_file = expand_path(&sub(&cf.registry.state_file))?;
        let cache = ResolvedCache {
            enabled: cf.cache.enabled,
            file: expand_path(&sub(&cf.cache.file))?,
            ttl: Duration::from_secs(cf.cache.ttl_secs),
            capacity: cf.cache.capacity,
        };
        let migrations = ResolvedMigrations {
            max_concurrency: cf.migrations.max_concurrency,
            continue_on_errors: cf.migrations.continue_on_errors,
            create_backups: cf.migrations.create_backups,
            validate_after_migration: cf.migrations.validate_after_migration,
            backup_dir: expand_path(&sub(&cf.migrations.backup_dir))?,
            auto_run: cf.migrations.auto_run,
        };

        // Resolve log file path if present
        let logging = match &cf.logging.file {
            Some(file) => LoggingConfig {
                level: cf.logging.level.clone(),
                file_level: cf.logging.file_level.clone(),
                file: Some(expand_path(&sub(&file.to_string_lossy()))?),
            },
            None => cf.logging.clone(),
        };

        Ok(ResolvedConfig {
            config_path,
            type_field: cf.documents.type_field,
            version_field: cf.documents.version_field,
            extension: cf.documents.extension.trim_start_matches('.').to_string(),
            root,
            state_file,
            cache,
            migrations,
            logging,
        })
    }
}

pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("schemata").join("config.toml");
    }
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("schemata").join("config.toml")
}

fn expand_path(input: &str) -> Result<PathBuf, ConfigError> {
    let expanded = full(input).map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue { field: field.to_string(), message: message.to_string() }
}
