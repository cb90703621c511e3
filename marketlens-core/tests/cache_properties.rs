//! Integration tests for tiered cache freshness, self-healing and clearing.

use chrono::Duration as ChronoDuration;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use marketlens_core::data::storage_key;
use marketlens_core::data::{CacheConfig, TieredCache};
use marketlens_core::ManualClock;

fn open(dir: &Path, clock: &Arc<ManualClock>) -> TieredCache {
    let config = CacheConfig {
        dir: dir.to_path_buf(),
        default_ttl_secs: 30,
    };
    TieredCache::open_with_clock(&config, clock.clone()).unwrap()
}

#[test]
fn entry_is_live_strictly_below_ttl() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(&dir, &clock);

    cache.set("k", json!(1), Duration::from_secs(30));
    clock.advance(ChronoDuration::milliseconds(29_999));
    assert_eq!(cache.get("k", None), Some(json!(1)));

    clock.advance(ChronoDuration::milliseconds(1));
    assert_eq!(cache.get("k", None), None);
    assert!(!cache.contains_persisted("k"));

    // Winding the clock back does not bring it back.
    clock.advance_secs(-20);
    assert_eq!(cache.get("k", None), None);
}

#[test]
fn persisted_tier_applies_the_same_freshness() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let clock = Arc::new(ManualClock::starting_now());
    open(&dir, &clock).set("k", json!("persisted"), Duration::from_secs(10));

    // A fresh instance has an empty memory tier and must read the record.
    let reopened = open(&dir, &clock);
    clock.advance_secs(9);
    assert_eq!(reopened.get("k", None), Some(json!("persisted")));
    assert!(reopened.contains_memory("k"));

    let cold = open(&dir, &clock);
    clock.advance_secs(1);
    assert_eq!(cold.get("k", None), None);
    assert!(cold.persisted_keys().is_empty());
}

#[test]
fn malformed_record_heals_to_a_miss() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(&dir, &clock);

    let path = dir.join(format!("{}.json", storage_key::encode("livePrice_^NSEI")));
    fs::write(&path, b"{ not json").unwrap();
    assert_eq!(cache.persisted_keys(), vec!["livePrice_^NSEI".to_string()]);

    assert_eq!(cache.get("livePrice_^NSEI", None), None);
    assert!(!path.exists());
    assert!(cache.persisted_keys().is_empty());
}

#[test]
fn pattern_clear_removes_matching_keys_from_both_tiers() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(&dir, &clock);

    for key in ["NIFTY_price", "NIFTY_trend", "SENSEX_price"] {
        cache.set(key, json!(key), Duration::from_secs(60));
    }

    let report = cache.clear(Some("NIFTY"));
    assert_eq!(report.memory_removed, 2);
    assert_eq!(report.persisted_removed, 2);

    assert_eq!(cache.persisted_keys(), vec!["SENSEX_price".to_string()]);
    assert!(cache.contains_memory("SENSEX_price"));
    assert!(!cache.contains_memory("NIFTY_price"));
    assert!(!cache.contains_memory("NIFTY_trend"));
    assert_eq!(cache.get("SENSEX_price", None), Some(json!("SENSEX_price")));
}

#[test]
fn unpatterned_clear_empties_both_tiers_for_any_key() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(&dir, &clock);

    let keys = ["", ".", "..", ".hidden", "livePrice_^NSEI"];
    for (i, key) in keys.iter().enumerate() {
        cache.set(key, json!(i), Duration::from_secs(30));
    }
    let mut expected: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    expected.sort();
    assert_eq!(cache.persisted_keys(), expected);
    assert_eq!(cache.stats().persisted_records, keys.len());

    let report = cache.clear(None);
    assert_eq!(report.memory_removed, keys.len());
    assert_eq!(report.persisted_removed, keys.len());
    assert_eq!(cache.stats().persisted_records, 0);
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

    let fresh = open(&dir, &clock);
    for key in keys {
        assert_eq!(fresh.get(key, None), None);
        assert!(!fresh.contains_persisted(key));
    }
}

#[test]
fn end_to_end_set_get_expire() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(&dir, &clock);

    cache.set("k", json!({"v": 1}), Duration::from_secs(30));
    assert_eq!(cache.get("k", None), Some(json!({"v": 1})));

    clock.advance_secs(31);
    assert_eq!(cache.get("k", None), None);
    assert!(!cache.contains_persisted("k"));
    assert_eq!(cache.stats().persisted_records, 0);
}

#[test]
fn long_keys_survive_listing_and_pattern_clear() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(&dir, &clock);

    let long_key = format!("intradayTrend_{}_20", "VERYLONGSYMBOL".repeat(20));
    cache.set(&long_key, json!(3), Duration::from_secs(60));
    assert_eq!(cache.persisted_keys(), vec![long_key.clone()]);

    let reopened = open(&dir, &clock);
    assert_eq!(reopened.get(&long_key, None), Some(json!(3)));

    let report = reopened.clear(Some("VERYLONG"));
    assert_eq!(report.persisted_removed, 1);
    assert!(reopened.persisted_keys().is_empty());
}

#[test]
fn sweep_then_close_leaves_only_live_records() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(&dir, &clock);

    cache.set("short", json!(1), Duration::from_secs(5));
    cache.set("long", json!(2), Duration::from_secs(600));
    fs::write(dir.join("garbage.json"), b"[").unwrap();

    clock.advance_secs(10);
    let report = cache.close();
    assert_eq!(report.persisted_removed, 2);
    assert_eq!(report.corrupt_removed, 1);
    assert_eq!(cache.stats().memory_entries, 0);

    let reopened = open(&dir, &clock);
    assert_eq!(reopened.persisted_keys(), vec!["long".to_string()]);
    assert_eq!(reopened.get("long", None), Some(json!(2)));
}
