//! In-memory document store for tests and embedding hosts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::error::{CollaboratorError, CollaboratorResult};

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<BTreeMap<PathBuf, String>>,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.documents.get_mut().insert(path.into(), content.into());
        self
    }

    /// Number of writes performed since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.documents.read().await.get(path.as_ref()).cloned()
    }

    pub async fn paths(&self) -> Vec<PathBuf> {
        self.documents.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, path: &Path) -> CollaboratorResult<String> {
        self.documents
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(path.display().to_string()))
    }

    async fn write(&self, path: &Path, content: &str) -> CollaboratorResult<()> {
        self.documents.write().await.insert(path.to_path_buf(), content.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.documents.read().await.contains_key(path)
    }

    async fn list(&self, folder: &Path) -> CollaboratorResult<Vec<PathBuf>> {
        Ok(self
            .documents
            .read()
            .await
            .keys()
            .filter(|p| p.starts_with(folder))
            .cloned()
            .collect())
    }
}
