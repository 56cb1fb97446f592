use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use schemata_core::cache::{CacheOptions, CachePersistence, Clock, JsonFileCache, TypeCache};
use schemata_core::types::{NoteType, PropertyDefinition, PropertyKind, SelectOption};
use tempfile::tempdir;

#[derive(Default)]
struct FixedClock(AtomicI64);

impl FixedClock {
    fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn task() -> NoteType {
    NoteType::new("task", "Task", "1.0.0").with_property(
        PropertyDefinition::new("status", "Status", PropertyKind::Select)
            .with_options(vec![SelectOption::new("todo").default_choice(), SelectOption::new("done").done()]),
    )
}

fn cache(path: &std::path::Path, clock: Arc<FixedClock>, ttl_secs: u64) -> TypeCache {
    TypeCache::new(CacheOptions { ttl: Some(Duration::from_secs(ttl_secs)), capacity: 4 })
        .with_clock(clock)
        .with_persistence(Box::new(JsonFileCache::new(path)))
}

#[test]
fn json_tier_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".schemata/cache.json");
    let clock = Arc::new(FixedClock::default());

    let mut first = cache(&path, clock.clone(), 60);
    first.set("task", task());
    assert!(path.exists());

    clock.advance(1_000);
    let mut second = cache(&path, clock.clone(), 60);
    assert_eq!(second.warm_up(), 1);
    let cached = second.get("task").unwrap();
    assert_eq!(cached, task());
    assert_eq!(cached.accessors()[0].default(), Some(serde_json::json!("todo")));
}

#[test]
fn expired_entries_are_not_warmed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let clock = Arc::new(FixedClock::default());

    cache(&path, clock.clone(), 1).set("task", task());
    clock.advance(1_001);

    let mut restarted = cache(&path, clock, 1);
    assert_eq!(restarted.warm_up(), 0);
    assert!(restarted.get("task").is_none());
    assert_eq!(restarted.stats().misses, 1);
}

#[test]
fn clear_removes_the_file_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let clock = Arc::new(FixedClock::default());

    let mut cache = cache(&path, clock, 60);
    cache.set("task", task());
    cache.set("project", NoteType::new("project", "Project", "1.0.0"));
    assert_eq!(cache.invalidate_pattern("^proj").unwrap(), 1);
    assert_eq!(JsonFileCache::new(&path).load().unwrap().len(), 1);

    cache.clear();
    assert!(JsonFileCache::new(&path).load().unwrap().is_empty());
    assert_eq!(cache.stats().size, 0);
}

#[test]
fn corrupt_file_is_bypassed_then_rewritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(JsonFileCache::new(&path).load().is_err());

    let mut cache = cache(&path, Arc::new(FixedClock::default()), 60);
    assert_eq!(cache.warm_up(), 0);
    assert!(cache.get("task").is_none());
    cache.set("task", task());
    assert!(cache.get("task").is_some());

    let repaired = JsonFileCache::new(&path).load().unwrap();
    assert!(repaired.contains_key("task"));
    let mut reopened = crate::cache(&path, Arc::new(FixedClock::default()), 60);
    assert_eq!(reopened.warm_up(), 1);
}
