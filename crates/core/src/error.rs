//! Errors raised by host-supplied collaborators.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a collaborator (document store, backup provider,
/// association validator, bulk applier).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl CollaboratorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;
