//! MemoryStore Tests
//!
//! Tests verify:
//! - String key operations and type checks
//! - Hash overwrite vs per-field set
//! - Native field increment semantics
//! - Expiry and TTL
//! - Atomic bounded increment
//! - Concurrent increments

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hashsync::{BoundedOutcome, BoundedStep, FieldMap, MemoryStore, StoreGateway, SyncError};

fn fields(entries: &[(&str, &str)]) -> FieldMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =============================================================================
// String Keys
// =============================================================================

#[test]
fn test_new_store_is_empty() {
    let store = MemoryStore::new();
    assert!(store.is_empty());
    assert_eq!(store.get("missing").unwrap(), None);
    assert!(!store.exists("missing").unwrap());
}

#[test]
fn test_set_get_and_overwrite() {
    let store = MemoryStore::new();

    store.set("k", "v1").unwrap();
    store.set("k", "v2").unwrap();

    assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_incr_starts_at_zero() {
    let store = MemoryStore::new();

    assert_eq!(store.incr("hits").unwrap(), 1);
    assert_eq!(store.incr("hits").unwrap(), 2);
    assert_eq!(store.get("hits").unwrap(), Some("2".to_string()));
}

#[test]
fn test_incr_non_integer_is_parse_error() {
    let store = MemoryStore::new();
    store.set("k", "abc").unwrap();

    assert!(matches!(store.incr("k"), Err(SyncError::Parse { .. })));
    assert_eq!(store.get("k").unwrap(), Some("abc".to_string()));
}

#[test]
fn test_delete_counts_existing_keys() {
    let store = MemoryStore::new();
    store.set("a", "1").unwrap();
    store.hash_set_field("b", "f", "1").unwrap();

    assert_eq!(store.delete(&["a", "b", "c"]).unwrap(), 2);
    assert!(store.is_empty());
}

#[test]
fn test_wrong_type_errors() {
    let store = MemoryStore::new();
    store.set("text", "x").unwrap();
    store.hash_set_field("hash", "f", "1").unwrap();

    assert!(matches!(store.get("hash"), Err(SyncError::WrongType(_))));
    assert!(matches!(store.hash_get_field("text", "f"), Err(SyncError::WrongType(_))));
    assert!(matches!(
        store.hash_set_all("text", &fields(&[("f", "1")])),
        Err(SyncError::WrongType(_))
    ));
    assert!(matches!(
        store.hash_increment_field("text", "f", 1),
        Err(SyncError::WrongType(_))
    ));
}

// =============================================================================
// Hash Entries
// =============================================================================

#[test]
fn test_hash_set_all_overwrites_whole_hash() {
    let store = MemoryStore::new();
    store.hash_set_all("h", &fields(&[("a", "1"), ("b", "2")])).unwrap();
    store.hash_set_all("h", &fields(&[("a", "9")])).unwrap();

    assert_eq!(store.hash_get_all("h").unwrap(), fields(&[("a", "9")]));
}

#[test]
fn test_hash_set_all_empty_removes_key() {
    let store = MemoryStore::new();
    store.hash_set_all("h", &fields(&[("a", "1")])).unwrap();
    store.hash_set_all("h", &FieldMap::new()).unwrap();

    assert!(!store.exists("h").unwrap());
}

#[test]
fn test_hash_set_field_reports_creation() {
    let store = MemoryStore::new();

    assert!(store.hash_set_field("h", "a", "1").unwrap());
    assert!(!store.hash_set_field("h", "a", "2").unwrap());
    assert_eq!(store.hash_get_field("h", "a").unwrap(), Some("2".to_string()));
}

#[test]
fn test_hash_get_missing() {
    let store = MemoryStore::new();

    assert_eq!(store.hash_get_field("h", "a").unwrap(), None);
    assert!(store.hash_get_all("h").unwrap().is_empty());
    assert!(store.hash_values("h").unwrap().is_empty());
    assert!(!store.hash_exists_field("h", "a").unwrap());
}

#[test]
fn test_hash_delete_fields_removes_empty_hash() {
    let store = MemoryStore::new();
    store.hash_set_all("h", &fields(&[("a", "1"), ("b", "2")])).unwrap();

    assert_eq!(store.hash_delete_fields("h", &["a", "zz"]).unwrap(), 1);
    assert!(store.exists("h").unwrap());
    assert_eq!(store.hash_delete_fields("h", &["b"]).unwrap(), 1);
    assert!(!store.exists("h").unwrap());
    assert_eq!(store.hash_delete_fields("h", &["b"]).unwrap(), 0);
}

#[test]
fn test_hash_values_and_exists() {
    let store = MemoryStore::new();
    store.hash_set_all("h", &fields(&[("a", "1"), ("b", "2")])).unwrap();

    assert_eq!(store.hash_values("h").unwrap(), vec!["1".to_string(), "2".to_string()]);
    assert!(store.hash_exists_field("h", "b").unwrap());
}

#[test]
fn test_hash_increment_field() {
    let store = MemoryStore::new();

    assert_eq!(store.hash_increment_field("h", "n", 5).unwrap(), 5);
    assert_eq!(store.hash_increment_field("h", "n", -7).unwrap(), -2);
    assert_eq!(store.hash_get_field("h", "n").unwrap(), Some("-2".to_string()));
}

#[test]
fn test_hash_increment_field_parse_error() {
    let store = MemoryStore::new();
    store.hash_set_field("h", "n", "4.5").unwrap();

    match store.hash_increment_field("h", "n", 1) {
        Err(SyncError::Parse { target, value }) => {
            assert_eq!(target, "h/n");
            assert_eq!(value, "4.5");
        }
        other => panic!("Expected Parse error, got {:?}", other),
    }
}

#[test]
fn test_hash_increment_field_overflow() {
    let store = MemoryStore::new();
    store.hash_set_field("h", "n", &i64::MAX.to_string()).unwrap();

    assert!(matches!(
        store.hash_increment_field("h", "n", 1),
        Err(SyncError::Overflow(_))
    ));
}

// =============================================================================
// Expiry
// =============================================================================

#[test]
fn test_expire_and_ttl() {
    let store = MemoryStore::new();
    store.hash_set_field("h", "a", "1").unwrap();

    assert_eq!(store.ttl("h").unwrap(), None);
    assert!(store.expire("h", 100).unwrap());
    assert_eq!(store.ttl("h").unwrap(), Some(100));
    assert!(!store.expire("missing", 100).unwrap());
}

#[test]
fn test_expire_zero_deletes() {
    let store = MemoryStore::new();
    store.set("k", "v").unwrap();

    assert!(store.expire("k", 0).unwrap());
    assert!(!store.exists("k").unwrap());
}

#[test]
fn test_expire_beyond_clock_range_never_expires() {
    let store = MemoryStore::new();
    store.hash_set_field("h", "a", "1").unwrap();

    assert!(store.expire("h", u64::MAX).unwrap());
    assert!(store.exists("h").unwrap());
    assert_eq!(store.ttl("h").unwrap(), None);
    assert_eq!(store.purge_expired(), 0);
    assert_eq!(store.hash_get_field("h", "a").unwrap(), Some("1".to_string()));
}

#[test]
fn test_expire_far_future_reports_ttl() {
    let store = MemoryStore::new();
    store.set("k", "v").unwrap();

    let seconds = 10 * 365 * 24 * 3600;
    assert!(store.expire("k", seconds).unwrap());
    assert_eq!(store.ttl("k").unwrap(), Some(seconds));
}

#[test]
fn test_set_clears_expiry() {
    let store = MemoryStore::new();
    store.set("k", "v").unwrap();
    store.expire("k", 100).unwrap();
    store.set("k", "w").unwrap();

    assert_eq!(store.ttl("k").unwrap(), None);
}

#[test]
fn test_expired_key_is_absent_and_purged() {
    let store = MemoryStore::new();
    store.set("k", "v").unwrap();
    store.expire("k", 1).unwrap();

    thread::sleep(Duration::from_millis(1100));

    assert_eq!(store.get("k").unwrap(), None);
    assert!(store.is_empty());
    assert_eq!(store.purge_expired(), 1);
    assert_eq!(store.purge_expired(), 0);
}

// =============================================================================
// Atomic Bounded Increment
// =============================================================================

#[test]
fn test_bounded_increment_applies_and_clamps() {
    let store = MemoryStore::new();
    store.hash_set_field("h", "n", "5").unwrap();

    let up = BoundedStep::up(3, 10).unwrap();
    assert_eq!(store.hash_increment_bounded("h", "n", up).unwrap(), BoundedOutcome::Applied(8));
    assert_eq!(store.hash_increment_bounded("h", "n", up).unwrap(), BoundedOutcome::Clamped(10));
    assert_eq!(store.hash_increment_bounded("h", "n", up).unwrap(), BoundedOutcome::Refused);
    assert_eq!(store.hash_get_field("h", "n").unwrap(), Some("10".to_string()));
}

#[test]
fn test_bounded_increment_refuses_unset() {
    let store = MemoryStore::new();
    let up = BoundedStep::up(1, 10).unwrap();

    assert_eq!(store.hash_increment_bounded("h", "n", up).unwrap(), BoundedOutcome::Refused);
    assert!(!store.exists("h").unwrap());

    store.hash_set_field("h", "other", "1").unwrap();
    assert_eq!(store.hash_increment_bounded("h", "n", up).unwrap(), BoundedOutcome::Refused);
    assert!(!store.hash_exists_field("h", "n").unwrap());
}

#[test]
fn test_bounded_decrement_clamps_to_min() {
    let store = MemoryStore::new();
    store.hash_set_field("h", "n", "2").unwrap();

    let down = BoundedStep::down(5, 0).unwrap();
    assert_eq!(store.hash_increment_bounded("h", "n", down).unwrap(), BoundedOutcome::Clamped(0));
    assert_eq!(store.hash_increment_bounded("h", "n", down).unwrap(), BoundedOutcome::Refused);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_field_increments_are_atomic() {
    let store = Arc::new(MemoryStore::new());

    let mut handles = vec![];
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for _ in 0..250 {
                store.hash_increment_field("h", "n", 1).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.hash_get_field("h", "n").unwrap(), Some("2000".to_string()));
}
