//! Registry backups taken before a migration touches anything.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::types::RegistrySnapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupOptions {
    /// Short label embedded in the backup name, usually the migration id.
    pub label: String,
}

impl BackupOptions {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupOutcome {
    pub success: bool,
    pub location: Option<PathBuf>,
    pub errors: Vec<String>,
}

impl BackupOutcome {
    pub fn stored(location: impl Into<PathBuf>) -> Self {
        Self { success: true, location: Some(location.into()), errors: vec![] }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, location: None, errors: vec![error.into()] }
    }
}

#[async_trait]
pub trait BackupProvider: Send + Sync {
    async fn backup_registry(&self, snapshot: &RegistrySnapshot, options: &BackupOptions) -> BackupOutcome;
}

/// Writes each backup as a timestamped YAML file in a directory.
#[derive(Debug, Clone)]
pub struct FileBackupProvider {
    dir: PathBuf,
}

impl FileBackupProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BackupProvider for FileBackupProvider {
    async fn backup_registry(&self, snapshot: &RegistrySnapshot, options: &BackupOptions) -> BackupOutcome {
        let yaml = match serde_yaml::to_string(snapshot) {
            Ok(yaml) => yaml,
            Err(e) => return BackupOutcome::failed(format!("failed to serialize registry: {}", e)),
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            return BackupOutcome::failed(format!("failed to create {}: {}", self.dir.display(), e));
        }

        let label = if options.label.is_empty() { "registry" } else { options.label.as_str() };
        let name = format!("{}-{}.yaml", label, Utc::now().format("%Y%m%dT%H%M%S%.3f"));
        let path = self.dir.join(name);

        match tokio::fs::write(&path, yaml).await {
            Ok(()) => {
                info!(path = %path.display(), types = snapshot.note_types.len(), "registry backed up");
                BackupOutcome::stored(path)
            }
            Err(e) => BackupOutcome::failed(format!("failed to write {}: {}", path.display(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NoteType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_backup_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let provider = FileBackupProvider::new(dir.path().join("backups"));
        let snapshot = RegistrySnapshot {
            note_types: vec![NoteType::new("task", "Task", "1.0.0")],
            ..Default::default()
        };

        let outcome = provider.backup_registry(&snapshot, &BackupOptions::labelled("convert")).await;
        assert!(outcome.success, "{:?}", outcome.errors);

        let location = outcome.location.unwrap();
        assert!(location.file_name().unwrap().to_string_lossy().starts_with("convert-"));
        let restored: RegistrySnapshot =
            serde_yaml::from_str(&std::fs::read_to_string(location).unwrap()).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[tokio::test]
    async fn test_file_backup_reports_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let provider = FileBackupProvider::new(&blocker);
        let outcome = provider.backup_registry(&RegistrySnapshot::default(), &BackupOptions::default()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 1);
    }
}
