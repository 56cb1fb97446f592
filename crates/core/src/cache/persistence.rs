use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use super::{CacheEntry, CacheError};

/// Backing store for the persistent cache tier.
pub trait CachePersistence: Send + Sync {
    fn load(&self) -> Result<HashMap<String, CacheEntry>, CacheError>;

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;
}

/// Persistent tier kept in a single JSON file.
///
/// A missing file is an empty cache.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io(&self, source: std::io::Error) -> CacheError {
        CacheError::Io { path: self.path.clone(), source }
    }
}

impl CachePersistence for JsonFileCache {
    fn load(&self) -> Result<HashMap<String, CacheEntry>, CacheError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(self.io(e)),
        };
        serde_json::from_str(&contents).map_err(|e| CacheError::Corrupt(e.to_string()))
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }
        let sorted: BTreeMap<&String, &CacheEntry> = entries.iter().collect();
        let json =
            serde_json::to_string_pretty(&sorted).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| self.io(e))
    }

    fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io(e)),
        }
    }
}
