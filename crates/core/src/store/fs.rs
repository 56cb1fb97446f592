//! Filesystem-backed document store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use super::DocumentStore;
use crate::error::{CollaboratorError, CollaboratorResult};

/// Documents stored as files under a root directory.
///
/// Listing only returns files with the configured extension and skips
/// hidden files and directories.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    extension: String,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), extension: "md".to_string() }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, path: &Path) -> CollaboratorResult<String> {
        let full = self.resolve(path);
        tokio::fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CollaboratorError::NotFound(path.display().to_string()),
            _ => CollaboratorError::io(full, e),
        })
    }

    async fn write(&self, path: &Path, content: &str) -> CollaboratorResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CollaboratorError::io(parent, e))?;
        }
        tokio::fs::write(&full, content).await.map_err(|e| CollaboratorError::io(full, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(self.resolve(path)).await.unwrap_or(false)
    }

    async fn list(&self, folder: &Path) -> CollaboratorResult<Vec<PathBuf>> {
        let root = self.root.clone();
        let base = self.resolve(folder);
        let extension = self.extension.clone();

        tokio::task::spawn_blocking(move || walk(&root, &base, &extension))
            .await
            .map_err(|e| CollaboratorError::Other(format!("listing task failed: {}", e)))?
    }
}

fn walk(root: &Path, base: &Path, extension: &str) -> CollaboratorResult<Vec<PathBuf>> {
    if !base.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(base)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(base).to_path_buf();
            match e.into_io_error() {
                Some(io) => CollaboratorError::io(path, io),
                None => CollaboratorError::Other(format!("filesystem loop at {}", path.display())),
            }
        })?;

        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(extension)
        {
            continue;
        }
        files.push(path.strip_prefix(root).unwrap_or(path).to_path_buf());
    }

    files.sort();
    Ok(files)
}
