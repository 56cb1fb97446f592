//! Two-tier cache of note types.
//!
//! The memory tier answers most lookups; an optional persistent tier lets a
//! host keep resolved types across restarts. The cache is a disposable view
//! of the registry: it can be wiped at any time, and persistent-tier failures
//! are logged and otherwise ignored.

mod persistence;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::NoteType;

pub use persistence::{CachePersistence, JsonFileCache};

/// Entries written with another format version are stale.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file is corrupt: {0}")]
    Corrupt(String),
}

/// Source of the current time in milliseconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub note_type: NoteType,
    /// Milliseconds since the epoch at insertion.
    pub timestamp: i64,
    pub format_version: u32,
    /// Insertion counter breaking timestamp ties during eviction.
    #[serde(default)]
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Entries older than this are stale; `None` never expires entries.
    pub ttl: Option<Duration>,
    /// Maximum entries per tier (at least one is always kept).
    pub capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { ttl: Some(Duration::from_secs(3600)), capacity: 256 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries in the memory tier.
    pub size: usize,
}

pub struct TypeCache {
    memory: HashMap<String, CacheEntry>,
    persistent: Option<Box<dyn CachePersistence>>,
    clock: Arc<dyn Clock>,
    options: CacheOptions,
    hits: u64,
    misses: u64,
    sequence: u64,
}

impl TypeCache {
    /// Memory-only cache on the system clock.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            memory: HashMap::new(),
            persistent: None,
            clock: Arc::new(SystemClock),
            options,
            hits: 0,
            misses: 0,
            sequence: 0,
        }
    }

    pub fn with_persistence(mut self, persistent: Box<dyn CachePersistence>) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Look up a note type, falling back to the persistent tier.
    pub fn get(&mut self, id: &str) -> Option<NoteType> {
        let now = self.clock.now_millis();

        match self.memory.get(id).map(|entry| self.is_stale(entry, now)) {
            Some(false) => {
                self.hits += 1;
                return self.memory.get(id).map(|entry| entry.note_type.clone());
            }
            Some(true) => {
                debug!(%id, "dropping stale cache entry");
                self.memory.remove(id);
            }
            None => {}
        }

        let from_disk = self
            .load_persistent()
            .and_then(|mut entries| entries.remove(id))
            .filter(|entry| !self.is_stale(entry, now));

        match from_disk {
            Some(mut entry) => {
                self.hits += 1;
                entry.note_type = entry.note_type.reconstructed();
                let note_type = entry.note_type.clone();
                self.sequence = self.sequence.max(entry.sequence);
                self.memory.insert(id.to_string(), entry);
                evict(&mut self.memory, self.options.capacity);
                Some(note_type)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert through both tiers, evicting the oldest entries over capacity.
    pub fn set(&mut self, id: &str, note_type: NoteType) {
        self.sequence += 1;
        let entry = CacheEntry {
            note_type,
            timestamp: self.clock.now_millis(),
            format_version: CACHE_FORMAT_VERSION,
            sequence: self.sequence,
        };

        self.memory.insert(id.to_string(), entry.clone());
        evict(&mut self.memory, self.options.capacity);

        let capacity = self.options.capacity;
        self.update_persistent(|entries| {
            entries.insert(id.to_string(), entry);
            evict(entries, capacity);
        });
    }

    /// Remove one id from both tiers.
    pub fn invalidate(&mut self, id: &str) {
        self.memory.remove(id);
        self.update_persistent(|entries| {
            entries.remove(id);
        });
    }

    /// Remove every id matching a regular expression from both tiers.
    ///
    /// Returns how many distinct ids were removed.
    pub fn invalidate_pattern(&mut self, pattern: &str) -> Result<usize, regex::Error> {
        let re = Regex::new(pattern)?;
        let mut removed: Vec<String> = self.memory.keys().filter(|k| re.is_match(k)).cloned().collect();
        self.memory.retain(|k, _| !re.is_match(k));

        self.update_persistent(|entries| {
            for key in entries.keys().filter(|k| re.is_match(k)) {
                if !removed.contains(key) {
                    removed.push(key.clone());
                }
            }
            entries.retain(|k, _| !re.is_match(k));
        });

        Ok(removed.len())
    }

    /// Empty both tiers. Statistics are kept.
    pub fn clear(&mut self) {
        self.memory.clear();
        if let Some(persistent) = &self.persistent
            && let Err(e) = persistent.clear()
        {
            warn!(error = %e, "failed to clear persistent cache");
        }
    }

    /// Load every fresh persistent entry into memory; returns how many loaded.
    pub fn warm_up(&mut self) -> usize {
        let now = self.clock.now_millis();
        let Some(entries) = self.load_persistent() else {
            return 0;
        };

        let mut loaded = 0;
        for (id, mut entry) in entries {
            if self.is_stale(&entry, now) {
                continue;
            }
            entry.note_type = entry.note_type.reconstructed();
            self.sequence = self.sequence.max(entry.sequence);
            self.memory.insert(id, entry);
            loaded += 1;
        }
        evict(&mut self.memory, self.options.capacity);
        debug!(loaded, "cache warmed up");
        loaded
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits, misses: self.misses, size: self.memory.len() }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.memory.contains_key(id)
    }

    fn is_stale(&self, entry: &CacheEntry, now: i64) -> bool {
        if entry.format_version != CACHE_FORMAT_VERSION {
            return true;
        }
        match self.options.ttl {
            Some(ttl) => now.saturating_sub(entry.timestamp) > i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            None => false,
        }
    }

    fn load_persistent(&self) -> Option<HashMap<String, CacheEntry>> {
        let persistent = self.persistent.as_ref()?;
        match persistent.load() {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(error = %e, "persistent cache unavailable, using memory only");
                None
            }
        }
    }

    fn update_persistent(&self, update: impl FnOnce(&mut HashMap<String, CacheEntry>)) {
        let Some(persistent) = &self.persistent else {
            return;
        };
        let mut entries = match persistent.load() {
            Ok(entries) => entries,
            Err(CacheError::Corrupt(e)) => {
                warn!(error = %e, "persistent cache is corrupt, rewriting it from memory");
                self.memory.clone()
            }
            Err(e) => {
                warn!(error = %e, "persistent cache unavailable, using memory only");
                return;
            }
        };
        update(&mut entries);
        if let Err(e) = persistent.save(&entries) {
            warn!(error = %e, "failed to write persistent cache");
        }
    }
}

/// Drop oldest entries until the map fits; the newest entry always survives.
fn evict(entries: &mut HashMap<String, CacheEntry>, capacity: usize) {
    let capacity = capacity.max(1);
    while entries.len() > capacity {
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| (e.timestamp, e.sequence))
            .map(|(k, _)| k.clone());
        match oldest {
            Some(key) => {
                debug!(id = %key, "evicting cache entry");
                entries.remove(&key);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[derive(Default)]
    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn advance(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Shared in-memory persistent tier that can be told to fail.
    #[derive(Clone, Default)]
    struct SharedTier {
        entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
        broken: Arc<Mutex<bool>>,
    }

    impl CachePersistence for SharedTier {
        fn load(&self) -> Result<HashMap<String, CacheEntry>, CacheError> {
            if *self.broken.lock().unwrap() {
                return Err(CacheError::Corrupt("broken".into()));
            }
            Ok(self.entries.lock().unwrap().clone())
        }
        fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
            if *self.broken.lock().unwrap() {
                return Err(CacheError::Corrupt("broken".into()));
            }
            *self.entries.lock().unwrap() = entries.clone();
            Ok(())
        }
        fn clear(&self) -> Result<(), CacheError> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }
    }

    fn nt(id: &str) -> NoteType {
        NoteType::new(id, id, "1.0.0")
    }

    fn cache(ttl_ms: u64, capacity: usize) -> (TypeCache, Arc<ManualClock>, SharedTier) {
        let clock = Arc::new(ManualClock::default());
        let tier = SharedTier::default();
        let cache = TypeCache::new(CacheOptions { ttl: Some(Duration::from_millis(ttl_ms)), capacity })
            .with_clock(clock.clone())
            .with_persistence(Box::new(tier.clone()));
        (cache, clock, tier)
    }

    #[test]
    fn test_set_then_get_before_and_after_ttl() {
        let (mut cache, clock, _) = cache(1000, 10);
        cache.set("task", nt("task"));

        clock.advance(999);
        assert_eq!(cache.get("task").map(|n| n.id), Some("task".to_string()));

        clock.advance(2);
        assert!(cache.get("task").is_none());
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, size: 0 });
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let (mut cache, clock, tier) = cache(60_000, 2);
        cache.set("a", nt("a"));
        clock.advance(1);
        cache.set("b", nt("b"));
        clock.advance(1);
        cache.set("c", nt("c"));

        assert!(!cache.contains("a"));
        assert!(cache.contains("b") && cache.contains("c"));
        assert!(!tier.entries.lock().unwrap().contains_key("a"));
    }

    #[test]
    fn test_eviction_same_timestamp_uses_insertion_order() {
        let (mut cache, _, _) = cache(60_000, 1);
        cache.set("a", nt("a"));
        cache.set("b", nt("b"));
        assert!(cache.contains("b"));
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_memory_miss_falls_back_to_persistent_tier() {
        let (mut first, _, tier) = cache(60_000, 10);
        first.set("task", nt("task"));

        let mut second = TypeCache::new(CacheOptions::default())
            .with_clock(Arc::new(ManualClock::default()))
            .with_persistence(Box::new(tier));
        assert!(!second.contains("task"));
        assert!(second.get("task").is_some());
        assert!(second.contains("task"));
        assert_eq!(second.stats().hits, 1);
    }

    #[test]
    fn test_format_version_mismatch_is_stale() {
        let (mut cache, _, tier) = cache(60_000, 10);
        tier.entries.lock().unwrap().insert(
            "old".into(),
            CacheEntry { note_type: nt("old"), timestamp: 0, format_version: 0, sequence: 1 },
        );
        assert!(cache.get("old").is_none());
        assert_eq!(cache.warm_up(), 0);
    }

    #[test]
    fn test_warm_up_skips_stale_entries() {
        let (mut cache, clock, tier) = cache(1000, 10);
        cache.set("old", nt("old"));
        clock.advance(5000);
        cache.set("new", nt("new"));

        let mut fresh = TypeCache::new(CacheOptions { ttl: Some(Duration::from_millis(1000)), capacity: 10 })
            .with_clock(clock.clone())
            .with_persistence(Box::new(tier));
        assert_eq!(fresh.warm_up(), 1);
        assert!(fresh.contains("new"));
        assert!(!fresh.contains("old"));
    }

    #[test]
    fn test_invalidate_pattern_and_clear_touch_both_tiers() {
        let (mut cache, _, tier) = cache(60_000, 10);
        for id in ["task", "task-archive", "project"] {
            cache.set(id, nt(id));
        }

        assert_eq!(cache.invalidate_pattern("^task").unwrap(), 2);
        assert!(cache.contains("project"));
        assert_eq!(tier.entries.lock().unwrap().len(), 1);

        cache.invalidate("project");
        assert!(tier.entries.lock().unwrap().is_empty());

        cache.set("x", nt("x"));
        cache.clear();
        assert_eq!(cache.stats().size, 0);
        assert!(tier.entries.lock().unwrap().is_empty());

        assert!(cache.invalidate_pattern("(").is_err());
    }

    #[test]
    fn test_broken_persistent_tier_degrades_to_memory() {
        let (mut cache, _, tier) = cache(60_000, 10);
        *tier.broken.lock().unwrap() = true;

        cache.set("task", nt("task"));
        assert!(cache.get("task").is_some());
        assert!(cache.get("missing").is_none());
        assert_eq!(cache.warm_up(), 0);
    }
}
