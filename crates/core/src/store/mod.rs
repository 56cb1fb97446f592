//! Document storage collaborators and header-based document lookup.

mod fs;
mod memory;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CollaboratorResult;
use crate::header::extract_header;

pub use fs::FsDocumentStore;
pub use memory::MemoryDocumentStore;

/// Default header field recording the schema version a document was written against.
pub const DEFAULT_VERSION_FIELD: &str = "type_version";

/// Read/write access to documents, addressed by store-relative paths.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, path: &Path) -> CollaboratorResult<String>;

    async fn write(&self, path: &Path, content: &str) -> CollaboratorResult<()>;

    async fn exists(&self, path: &Path) -> bool;

    /// Documents under `folder` (recursively), sorted by path.
    async fn list(&self, folder: &Path) -> CollaboratorResult<Vec<PathBuf>>;
}

/// Names of the header fields that tie a document to a note type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFields {
    pub type_field: String,
    pub version_field: String,
}

impl Default for HeaderFields {
    fn default() -> Self {
        Self {
            type_field: crate::processor::DEFAULT_TYPE_FIELD.to_string(),
            version_field: DEFAULT_VERSION_FIELD.to_string(),
        }
    }
}

/// Locate documents whose header claims a note type.
///
/// When `version` is given, documents recording a different version are
/// skipped; documents recording no version match any version. Unreadable or
/// malformed documents are skipped.
pub async fn find_documents(
    store: &dyn DocumentStore,
    folder: &Path,
    type_id: &str,
    version: Option<&str>,
    fields: &HeaderFields,
) -> CollaboratorResult<Vec<PathBuf>> {
    let mut found = Vec::new();

    for path in store.list(folder).await? {
        let content = match store.read(&path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable document");
                continue;
            }
        };
        let header = match extract_header(&content) {
            Ok(extracted) => extracted.header,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping document with malformed header");
                continue;
            }
        };

        if header.get(&fields.type_field).and_then(Value::as_str).map(str::trim) != Some(type_id) {
            continue;
        }

        let recorded = header.get(&fields.version_field).and_then(version_text);
        if let (Some(wanted), Some(recorded)) = (version, recorded.as_deref())
            && wanted != recorded
        {
            continue;
        }

        found.push(path);
    }

    Ok(found)
}

/// Header versions may parse as numbers (`1.5`) or strings (`1.0.0`).
fn version_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
