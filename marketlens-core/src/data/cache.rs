//! Two-tier TTL cache: an in-process map in front of one JSON record per key.
//!
//! Layout: `{cache_dir}/{encoded key}.json` (see [`storage_key`](super::storage_key))
//!
//! Features:
//! - Reads check memory first, then disk; live disk hits are promoted
//! - Liveness is re-evaluated on every read: live iff age < TTL
//! - Expired and unreadable records are deleted on read and reported as a miss
//! - Atomic writes (unique temp file, rename into place)
//! - Failed disk writes are logged; the in-process tier stays authoritative
//! - Injectable [`Clock`] for freshness tests

use super::storage_key;
use crate::clock::{Clock, SystemClock};
use crate::sync::lock;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Temp files older than this are leftovers from a failed rename or a crash.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt cache record {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted record format.
///
/// `key` and `ttl` are optional on read: records written by the fixed
/// max-age variant carry neither and fall back to the cache default TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    /// TTL in whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            default_ttl_secs: 30,
        }
    }
}

/// Counts from a clear or expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub memory_removed: usize,
    pub persisted_removed: usize,
    /// Subset of `persisted_removed` that could not be read.
    pub corrupt_removed: usize,
    /// Abandoned temp files from interrupted writes.
    pub temp_removed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub persisted_records: usize,
    pub persisted_bytes: u64,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Value,
    created_at: DateTime<Utc>,
    ttl_secs: u64,
}

/// Live iff age < TTL, compared at millisecond resolution.
fn is_live(created_at: DateTime<Utc>, ttl_ms: u64, now: DateTime<Utc>) -> bool {
    let age_ms = (now - created_at).num_milliseconds();
    age_ms < i64::try_from(ttl_ms).unwrap_or(i64::MAX)
}

fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn is_record_file(name: &str) -> bool {
    name.ends_with(&format!(".{RECORD_EXTENSION}"))
}

fn is_temp_file(name: &str) -> bool {
    name.ends_with(&format!(".{TEMP_EXTENSION}"))
        && name.contains(&format!(".{RECORD_EXTENSION}."))
}

pub struct TieredCache {
    dir: PathBuf,
    default_ttl_secs: u64,
    memory: Mutex<HashMap<String, MemoryEntry>>,
    clock: Arc<dyn Clock>,
    temp_counter: AtomicU64,
}

impl TieredCache {
    /// Open (creating if needed) a cache directory with the system clock.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        fs::create_dir_all(&config.dir).map_err(|source| CacheError::Io {
            path: config.dir.clone(),
            source,
        })?;
        info!(
            dir = %config.dir.display(),
            default_ttl_secs = config.default_ttl_secs,
            "cache opened"
        );
        Ok(Self {
            dir: config.dir.clone(),
            default_ttl_secs: config.default_ttl_secs,
            memory: Mutex::new(HashMap::new()),
            clock,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Look up a key. `ttl_override` replaces the entry's own TTL for this
    /// read only.
    pub fn get(&self, key: &str, ttl_override: Option<Duration>) -> Option<Value> {
        let now = self.clock.now();
        let override_ms = ttl_override.map(duration_ms);

        {
            let mut memory = lock(&self.memory);
            if let Some(entry) = memory.get(key) {
                let ttl = override_ms.unwrap_or(secs_to_ms(entry.ttl_secs));
                if is_live(entry.created_at, ttl, now) {
                    debug!(key, tier = "memory", "cache hit");
                    return Some(entry.data.clone());
                }
                memory.remove(key);
            }
        }

        let path = self.record_path(key);
        match self.read_record(&path) {
            Ok(None) => {
                debug!(key, "cache miss");
                None
            }
            Ok(Some(record)) if record.key.as_deref().is_some_and(|k| k != key) => {
                warn!(
                    key,
                    path = %path.display(),
                    "cache record belongs to another key, removing"
                );
                self.remove_file(&path);
                None
            }
            Ok(Some(record)) => {
                let own_ttl = record.ttl.unwrap_or(self.default_ttl_secs);
                let ttl = override_ms.unwrap_or(secs_to_ms(own_ttl));
                if !is_live(record.timestamp, ttl, now) {
                    debug!(key, "persisted record expired, removing");
                    self.remove_file(&path);
                    return None;
                }
                debug!(key, tier = "persisted", "cache hit");
                self.promote(key, &record, own_ttl);
                Some(record.data)
            }
            Err(e) => {
                warn!(key, error = %e, "unreadable cache record, removing");
                self.remove_file(&path);
                None
            }
        }
    }

    /// Insert into memory unless a newer entry landed there meanwhile.
    fn promote(&self, key: &str, record: &CacheRecord, ttl_secs: u64) {
        let mut memory = lock(&self.memory);
        let newer_present = memory
            .get(key)
            .is_some_and(|existing| existing.created_at >= record.timestamp);
        if !newer_present {
            memory.insert(
                key.to_string(),
                MemoryEntry {
                    data: record.data.clone(),
                    created_at: record.timestamp,
                    ttl_secs,
                },
            );
        }
    }

    /// Store a value in both tiers, stamped with the current time.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        let now = self.clock.now();
        let ttl_secs = ttl.as_secs();
        let record = CacheRecord {
            key: Some(key.to_string()),
            data: value.clone(),
            timestamp: now,
            ttl: Some(ttl_secs),
        };

        lock(&self.memory).insert(
            key.to_string(),
            MemoryEntry {
                data: value,
                created_at: now,
                ttl_secs,
            },
        );

        match self.write_record(key, &record) {
            Ok(()) => debug!(key, ttl_secs, "cache write"),
            Err(e) => warn!(key, error = %e, "persisted cache write failed, keeping in-process entry"),
        }
    }

    /// Typed read. A payload that does not decode as `T` is evicted.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str, ttl_override: Option<Duration>) -> Option<T> {
        let value = self.get(key, ttl_override)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "cached payload has unexpected shape, removing");
                self.remove(key);
                None
            }
        }
    }

    pub fn set_as<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl);
        Ok(())
    }

    /// Drop one key from both tiers.
    pub fn remove(&self, key: &str) {
        lock(&self.memory).remove(key);
        self.remove_file(&self.record_path(key));
    }

    pub fn contains_memory(&self, key: &str) -> bool {
        lock(&self.memory).contains_key(key)
    }

    pub fn contains_persisted(&self, key: &str) -> bool {
        self.record_path(key).is_file()
    }

    /// Without a pattern, empty both tiers. With one, remove every key whose
    /// logical name contains it.
    pub fn clear(&self, pattern: Option<&str>) -> CleanupReport {
        let mut report = CleanupReport::default();

        {
            let mut memory = lock(&self.memory);
            let before = memory.len();
            match pattern {
                None => memory.clear(),
                Some(p) => memory.retain(|key, _| !key.contains(p)),
            }
            report.memory_removed = before - memory.len();
        }

        for path in self.record_files() {
            let matched = match pattern {
                None => true,
                Some(p) => self
                    .logical_key(&path)
                    .is_some_and(|key| key.contains(p)),
            };
            if matched && self.remove_file(&path) {
                report.persisted_removed += 1;
            }
        }
        report.temp_removed = self.sweep_temp_files(STALE_TEMP_AGE);

        info!(
            pattern = pattern.unwrap_or("*"),
            memory = report.memory_removed,
            persisted = report.persisted_removed,
            "cache cleared"
        );
        report
    }

    /// Remove in-process entries older than the default TTL and persisted
    /// records that are expired by their own TTL or unreadable.
    pub fn cleanup_expired(&self) -> CleanupReport {
        let now = self.clock.now();
        let mut report = CleanupReport::default();

        {
            let mut memory = lock(&self.memory);
            let before = memory.len();
            let default_ttl = secs_to_ms(self.default_ttl_secs);
            memory.retain(|_, entry| is_live(entry.created_at, default_ttl, now));
            report.memory_removed = before - memory.len();
        }

        for path in self.record_files() {
            match self.read_record(&path) {
                Ok(Some(record)) => {
                    let ttl = secs_to_ms(record.ttl.unwrap_or(self.default_ttl_secs));
                    if !is_live(record.timestamp, ttl, now) && self.remove_file(&path) {
                        report.persisted_removed += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable cache record, removing");
                    if self.remove_file(&path) {
                        report.persisted_removed += 1;
                        report.corrupt_removed += 1;
                    }
                }
            }
        }
        report.temp_removed = self.sweep_temp_files(STALE_TEMP_AGE);

        info!(
            memory = report.memory_removed,
            persisted = report.persisted_removed,
            corrupt = report.corrupt_removed,
            temp = report.temp_removed,
            "expired cache entries swept"
        );
        report
    }

    /// Logical keys of every persisted record, sorted. Unreadable records
    /// with shortened names are skipped.
    pub fn persisted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .record_files()
            .iter()
            .filter_map(|path| self.logical_key(path))
            .collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> CacheStats {
        let files = self.record_files();
        let persisted_bytes = files
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        CacheStats {
            memory_entries: lock(&self.memory).len(),
            persisted_records: files.len(),
            persisted_bytes,
        }
    }

    /// Final expiry sweep, then drop the in-process tier.
    pub fn close(&self) -> CleanupReport {
        let report = self.cleanup_expired();
        lock(&self.memory).clear();
        info!(dir = %self.dir.display(), "cache closed");
        report
    }

    // ── Persisted tier helpers ──────────────────────────────────────

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{RECORD_EXTENSION}", storage_key::encode(key)))
    }

    fn files_named(&self, matches: fn(&str) -> bool) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().is_some_and(matches))
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect()
    }

    fn record_files(&self) -> Vec<PathBuf> {
        self.files_named(is_record_file)
    }

    /// Remove temp files whose last write is at least `min_age` old.
    fn sweep_temp_files(&self, min_age: Duration) -> usize {
        let mut removed = 0;
        for path in self.files_named(is_temp_file) {
            let stale = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age >= min_age);
            if stale && self.remove_file(&path) {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "abandoned cache temp files removed");
        }
        removed
    }

    /// Logical key from the file name, or from the record body when the name
    /// was shortened.
    fn logical_key(&self, path: &Path) -> Option<String> {
        let stem = path
            .file_name()?
            .to_str()?
            .strip_suffix(&format!(".{RECORD_EXTENSION}"))?;
        if let Some(key) = storage_key::decode(stem) {
            return Some(key);
        }
        self.read_record(path).ok().flatten().and_then(|r| r.key)
    }

    fn read_record(&self, path: &Path) -> Result<Option<CacheRecord>, CacheError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Write to a unique temp file, then rename into place.
    fn write_record(&self, key: &str, record: &CacheRecord) -> Result<(), CacheError> {
        let path = self.record_path(key);
        let json = serde_json::to_vec(record)?;

        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!(
            "{RECORD_EXTENSION}.{}-{n}.{TEMP_EXTENSION}",
            std::process::id()
        ));

        fs::write(&tmp_path, &json).map_err(|source| CacheError::Io {
            path: tmp_path.clone(),
            source,
        })?;

        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::Io {
                path: path.clone(),
                source,
            }
        })
    }

    /// Returns whether a file was actually removed.
    fn remove_file(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove cache record");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn open(dir: &Path, clock: &Arc<ManualClock>) -> TieredCache {
        let config = CacheConfig {
            dir: dir.to_path_buf(),
            default_ttl_secs: 30,
        };
        TieredCache::open_with_clock(&config, clock.clone()).unwrap()
    }

    #[test]
    fn set_then_get_from_memory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);

        cache.set("k", json!({"v": 1}), Duration::from_secs(30));
        assert_eq!(cache.get("k", None), Some(json!({"v": 1})));
        assert!(cache.contains_memory("k"));
        assert!(cache.contains_persisted("k"));
    }

    #[test]
    fn persisted_hit_is_promoted() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        open(&dir, &clock).set("k", json!([1, 2, 3]), Duration::from_secs(60));

        let fresh = open(&dir, &clock);
        assert!(!fresh.contains_memory("k"));
        assert_eq!(fresh.get("k", None), Some(json!([1, 2, 3])));
        assert!(fresh.contains_memory("k"));
    }

    #[test]
    fn record_format_echoes_key_and_ttl() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        cache.set("livePrice_^NSEI", json!(1), Duration::from_secs(30));

        let raw = fs::read_to_string(dir.join("livePrice_%5ENSEI.json")).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["key"], "livePrice_^NSEI");
        assert_eq!(value["ttl"], 30);
        assert_eq!(value["data"], 1);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn ttl_override_applies_to_one_read() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        cache.set("k", json!(1), Duration::from_secs(60));

        clock.advance_secs(20);
        assert!(cache.get("k", Some(Duration::from_secs(10))).is_none());
        // The override miss evicted both tiers.
        assert!(cache.get("k", None).is_none());
    }

    #[test]
    fn sub_second_override_is_not_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        cache.set("k", json!(1), Duration::from_secs(60));

        clock.advance(chrono::Duration::milliseconds(200));
        assert_eq!(cache.get("k", Some(Duration::from_millis(500))), Some(json!(1)));

        let fresh = open(&dir, &clock);
        assert_eq!(fresh.get("k", Some(Duration::from_millis(500))), Some(json!(1)));

        clock.advance(chrono::Duration::milliseconds(300));
        assert!(cache.get("k", Some(Duration::from_millis(500))).is_none());
    }

    #[test]
    fn record_without_ttl_uses_default() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);

        let record = json!({"data": {"p": 5}, "timestamp": clock.now()});
        fs::write(dir.join("legacy.json"), record.to_string()).unwrap();

        clock.advance_secs(29);
        assert_eq!(cache.get("legacy", None), Some(json!({"p": 5})));

        let other = open(&dir, &clock);
        clock.advance_secs(1);
        assert!(other.get("legacy", None).is_none());
    }

    #[test]
    fn record_for_another_key_is_treated_as_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        let record = json!({"key": "other", "data": 1, "timestamp": clock.now(), "ttl": 30});
        fs::write(dir.join("mine.json"), record.to_string()).unwrap();

        assert!(cache.get("mine", None).is_none());
        assert!(!dir.join("mine.json").exists());
    }

    #[test]
    fn typed_get_evicts_wrong_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        cache.set("k", json!("not a number"), Duration::from_secs(30));

        assert_eq!(cache.get_as::<f64>("k", None), None);
        assert!(!cache.contains_memory("k"));
        assert!(!cache.contains_persisted("k"));

        cache.set_as("k", &42.5f64, Duration::from_secs(30)).unwrap();
        assert_eq!(cache.get_as::<f64>("k", None), Some(42.5));
    }

    #[test]
    fn cleanup_uses_default_ttl_for_memory_and_own_ttl_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        cache.set("short", json!(1), Duration::from_secs(10));
        cache.set("long", json!(2), Duration::from_secs(120));
        fs::write(dir.join("junk.json"), "{not json").unwrap();

        clock.advance_secs(40);
        let report = cache.cleanup_expired();
        // Both memory entries are older than the 30s default.
        assert_eq!(report.memory_removed, 2);
        // "short" expired, "junk" unreadable; "long" survives on disk.
        assert_eq!(report.persisted_removed, 2);
        assert_eq!(report.corrupt_removed, 1);
        assert_eq!(cache.persisted_keys(), vec!["long".to_string()]);
        assert_eq!(cache.get("long", None), Some(json!(2)));
    }

    #[test]
    fn stats_and_close() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        cache.set("a", json!(1), Duration::from_secs(30));
        cache.set("b", json!(2), Duration::from_secs(30));

        let stats = cache.stats();
        assert_eq!(stats.memory_entries, 2);
        assert_eq!(stats.persisted_records, 2);
        assert!(stats.persisted_bytes > 0);

        cache.close();
        assert_eq!(cache.stats().memory_entries, 0);
        assert_eq!(cache.stats().persisted_records, 2);
    }

    #[test]
    fn long_keys_are_listed_and_cleared_by_logical_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        let long = format!("NIFTY_{}", "x".repeat(300));
        cache.set(&long, json!(1), Duration::from_secs(30));

        assert_eq!(cache.persisted_keys(), vec![long.clone()]);
        assert_eq!(cache.get(&long, None), Some(json!(1)));

        let report = cache.clear(Some("NIFTY"));
        assert_eq!(report.persisted_removed, 1);
        assert!(cache.persisted_keys().is_empty());
    }

    #[test]
    fn abandoned_temp_files_are_swept() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        cache.set("k", json!(1), Duration::from_secs(30));
        let leftover = dir.join("k.json.999-3.tmp");
        fs::write(&leftover, b"{\"key\": \"k\"").unwrap();

        // Too recent to be abandoned: an in-flight write may own it.
        assert_eq!(cache.cleanup_expired().temp_removed, 0);
        assert!(leftover.exists());
        assert_eq!(cache.stats().persisted_records, 1);
        assert_eq!(cache.persisted_keys(), vec!["k".to_string()]);

        assert_eq!(cache.sweep_temp_files(Duration::ZERO), 1);
        assert!(!leftover.exists());
        assert!(cache.contains_persisted("k"));
    }

    #[test]
    fn no_temp_files_left_after_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = open(&dir, &clock);
        for i in 0..5 {
            cache.set("k", json!(i), Duration::from_secs(30));
        }
        let names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }
}
