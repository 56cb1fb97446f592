//! Bounded-concurrency document rewriting.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CollaboratorResult;
use crate::header::extract_header;
use crate::store::DocumentStore;

type RewriteFn = dyn Fn(&Path, &str) -> Result<Option<String>, String> + Send + Sync;

/// How to rewrite one document.
///
/// The function receives the path and current text and returns the new text,
/// or `None` when the document needs no change.
#[derive(Clone)]
pub struct RewritePlan {
    rewrite: Arc<RewriteFn>,
}

impl RewritePlan {
    pub fn new<F>(rewrite: F) -> Self
    where
        F: Fn(&Path, &str) -> Result<Option<String>, String> + Send + Sync + 'static,
    {
        Self { rewrite: Arc::new(rewrite) }
    }

    pub fn rewrite(&self, path: &Path, content: &str) -> Result<Option<String>, String> {
        (self.rewrite)(path, content)
    }
}

impl std::fmt::Debug for RewritePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewritePlan").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    pub max_concurrency: usize,
    pub continue_on_errors: bool,
    pub create_backups: bool,
    pub validate_after_migration: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self { max_concurrency: 4, continue_on_errors: true, create_backups: true, validate_after_migration: true }
    }
}

/// A failure on one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentError {
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// Documents rewritten or already up to date, sorted by path.
    pub successful_files: Vec<PathBuf>,
    pub errors: Vec<DocumentError>,
}

/// Applies a rewrite plan to many documents.
#[async_trait]
pub trait BulkApplier: Send + Sync {
    async fn apply(
        &self,
        paths: &[PathBuf],
        plan: &RewritePlan,
        options: &BulkOptions,
    ) -> CollaboratorResult<BulkOutcome>;
}

/// [`BulkApplier`] writing through a [`DocumentStore`].
///
/// Each changed document is backed up to `<path>.bak` before it is written.
pub struct StoreBulkApplier {
    store: Arc<dyn DocumentStore>,
}

impl StoreBulkApplier {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn apply_one(
        &self,
        path: &Path,
        plan: &RewritePlan,
        options: &BulkOptions,
    ) -> Result<(), DocumentError> {
        let fail = |message: String| DocumentError { path: path.to_path_buf(), message };

        let original = self.store.read(path).await.map_err(|e| fail(e.to_string()))?;
        let Some(updated) = plan.rewrite(path, &original).map_err(fail)? else {
            debug!(path = %path.display(), "document already up to date");
            return Ok(());
        };
        if updated == original {
            return Ok(());
        }

        if options.create_backups {
            self.store
                .write(&backup_path(path), &original)
                .await
                .map_err(|e| fail(format!("backup failed: {}", e)))?;
        }

        self.store.write(path, &updated).await.map_err(|e| fail(e.to_string()))?;

        if options.validate_after_migration {
            let written = self.store.read(path).await.map_err(|e| fail(e.to_string()))?;
            extract_header(&written).map_err(|e| fail(format!("post-write validation failed: {}", e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl BulkApplier for StoreBulkApplier {
    async fn apply(
        &self,
        paths: &[PathBuf],
        plan: &RewritePlan,
        options: &BulkOptions,
    ) -> CollaboratorResult<BulkOutcome> {
        let mut outcome = BulkOutcome::default();
        let futures: Vec<_> = paths
            .iter()
            .map(|path| async move { (path, self.apply_one(path, plan, options).await) })
            .collect();
        let mut results = stream::iter(futures).buffer_unordered(options.max_concurrency.max(1));

        while let Some((path, result)) = results.next().await {
            match result {
                Ok(()) => outcome.successful_files.push(path.clone()),
                Err(e) => {
                    warn!(path = %e.path.display(), error = %e.message, "document rewrite failed");
                    outcome.errors.push(e);
                    if !options.continue_on_errors {
                        break;
                    }
                }
            }
        }

        outcome.successful_files.sort();
        outcome.errors.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(outcome)
    }
}

/// `notes/a.md` backs up to `notes/a.md.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;

    fn uppercase_plan() -> RewritePlan {
        RewritePlan::new(|_, content| {
            if content.contains("fail") {
                return Err("refusing to rewrite".into());
            }
            let upper = content.to_uppercase();
            Ok((upper != content).then_some(upper))
        })
    }

    fn store() -> Arc<MemoryDocumentStore> {
        Arc::new(
            MemoryDocumentStore::new()
                .with_document("a.md", "alpha")
                .with_document("b.md", "BETA")
                .with_document("c.md", "please fail")
                .with_document("d.md", "delta"),
        )
    }

    fn paths() -> Vec<PathBuf> {
        ["a.md", "b.md", "c.md", "d.md"].iter().map(PathBuf::from).collect()
    }

    #[tokio::test]
    async fn test_apply_continues_past_errors() {
        let store = store();
        let applier = StoreBulkApplier::new(store.clone());

        let outcome = applier.apply(&paths(), &uppercase_plan(), &BulkOptions::default()).await.unwrap();

        assert_eq!(
            outcome.successful_files,
            vec![PathBuf::from("a.md"), PathBuf::from("b.md"), PathBuf::from("d.md")]
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].path, PathBuf::from("c.md"));

        assert_eq!(store.get("a.md").await.as_deref(), Some("ALPHA"));
        assert_eq!(store.get("a.md.bak").await.as_deref(), Some("alpha"));
        // unchanged document is neither written nor backed up
        assert!(store.get("b.md.bak").await.is_none());
        assert_eq!(store.write_count(), 4);
    }

    #[tokio::test]
    async fn test_apply_without_backups() {
        let store = store();
        let applier = StoreBulkApplier::new(store.clone());
        let options = BulkOptions { create_backups: false, max_concurrency: 1, ..Default::default() };

        applier.apply(&paths(), &uppercase_plan(), &options).await.unwrap();
        assert!(store.get("a.md.bak").await.is_none());
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_apply_stops_on_error() {
        let store = store();
        let applier = StoreBulkApplier::new(store.clone());
        let options = BulkOptions { continue_on_errors: false, max_concurrency: 1, ..Default::default() };

        let outcome = applier.apply(&paths(), &uppercase_plan(), &options).await.unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(store.get("d.md").await.as_deref(), Some("delta"));
    }

    #[tokio::test]
    async fn test_post_write_validation_reports_broken_header() {
        let store = Arc::new(MemoryDocumentStore::new().with_document("x.md", "body"));
        let applier = StoreBulkApplier::new(store);
        let plan = RewritePlan::new(|_, _| Ok(Some("---\ntags: [oops\n---\n".into())));

        let outcome = applier.apply(&[PathBuf::from("x.md")], &plan, &BulkOptions::default()).await.unwrap();
        assert!(outcome.successful_files.is_empty());
        assert!(outcome.errors[0].message.contains("post-write validation"));
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(backup_path(Path::new("notes/a.md")), PathBuf::from("notes/a.md.bak"));
    }
}
