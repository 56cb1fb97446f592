//! Persisted engine state: registered note types, version history and the
//! migration ledger.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::migration::MigrationRecord;
use crate::types::{RegistrySnapshot, TypeRegistry};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse state file {0}: {1}")]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to write state file {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub registry: RegistrySnapshot,
    #[serde(default)]
    pub ledger: Vec<MigrationRecord>,
}

impl StateFile {
    /// Load state from YAML; a missing file is empty state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file, starting empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(StateError::Read(path.to_path_buf(), e)),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|e| StateError::Parse(path.to_path_buf(), e))
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let yaml = serde_yaml::to_string(self).map_err(StateError::Serialize)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StateError::Write(parent.to_path_buf(), e))?;
        }
        fs::write(path, yaml).map_err(|e| StateError::Write(path.to_path_buf(), e))
    }

    /// Capture a registry and ledger.
    pub fn capture(registry: &TypeRegistry, ledger: &[MigrationRecord]) -> Self {
        Self { registry: registry.snapshot(), ledger: ledger.to_vec() }
    }

    pub fn into_parts(self) -> (TypeRegistry, Vec<MigrationRecord>) {
        (TypeRegistry::restore(self.registry), self.ledger)
    }
}
