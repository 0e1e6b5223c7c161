//! File Store Invariant Tests
//!
//! - Identity sequencing under both identity policies
//! - Concurrent inserts on one instance lose nothing
//! - Equality filters and the empty filter
//! - Unique fields
//! - Records survive reopening the store

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::thread;

use recordstore::file_store::FileStore;
use recordstore::filter::Filter;
use recordstore::integrity::IntegrityLedger;
use recordstore::schema::{catalog, FieldSpec, Record, SchemaDescriptor, Value};
use recordstore::store::{IdentityPolicy, RecordStore, StoreError};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn scores_schema() -> SchemaDescriptor {
    SchemaDescriptor::builder("scores")
        .field("id", FieldSpec::serial())
        .field("name", FieldSpec::text().required())
        .field("score", FieldSpec::integer().default_value(0))
        .build()
        .unwrap()
}

fn open(tmp: &TempDir, schema: SchemaDescriptor, policy: IdentityPolicy) -> FileStore {
    let ledger = Arc::new(IntegrityLedger::open(tmp.path().join("hashes.json")));
    let path = tmp.path().join(format!("{}.csv", schema.entity()));
    FileStore::open(path, schema, ledger, policy).unwrap()
}

fn named(name: &str) -> Record {
    Record::new().with("name", name)
}

fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|r| r.get("id").and_then(Value::as_integer).unwrap())
        .collect()
}

// =============================================================================
// Identity Sequencing
// =============================================================================

#[test]
fn test_sequential_inserts_get_one_to_n() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);

    for i in 0..5 {
        store.insert(&named(&format!("n{}", i))).unwrap();
    }

    assert_eq!(ids(&store.read_all().unwrap()), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_reuse_max_hands_out_deleted_maximum_again() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);
    for name in ["a", "b", "c"] {
        store.insert(&named(name)).unwrap();
    }

    assert!(store.delete(&Filter::new().eq("id", 3)).unwrap());
    let again = store.insert(&named("d")).unwrap();

    assert_eq!(again.get("id"), Some(&Value::Integer(3)));
}

#[test]
fn test_monotonic_never_reuses() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::Monotonic);
    for name in ["a", "b", "c"] {
        store.insert(&named(name)).unwrap();
    }

    store.delete(&Filter::new().eq("id", 3)).unwrap();
    let next = store.insert(&named("d")).unwrap();
    assert_eq!(next.get("id"), Some(&Value::Integer(4)));
}

#[test]
fn test_monotonic_counter_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    {
        let store = open(&tmp, scores_schema(), IdentityPolicy::Monotonic);
        store.insert(&named("a")).unwrap();
        store.insert(&named("b")).unwrap();
        store.delete(&Filter::new()).unwrap();
    }

    let store = open(&tmp, scores_schema(), IdentityPolicy::Monotonic);
    let next = store.insert(&named("c")).unwrap();
    assert_eq!(next.get("id"), Some(&Value::Integer(3)));
}

#[test]
fn test_explicit_identity_respected_and_followed() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);

    store.insert(&named("a").with("id", 10)).unwrap();
    let next = store.insert(&named("b")).unwrap();

    assert_eq!(next.get("id"), Some(&Value::Integer(11)));
}

#[test]
fn test_identity_exhaustion_rejected_before_write() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);
    store.insert(&named("last").with("id", i64::MAX)).unwrap();

    let err = store.insert(&named("overflow")).unwrap_err();
    assert!(matches!(err, StoreError::IdentityExhausted { ref entity } if entity == "scores"));
    assert_eq!(store.read_all().unwrap().len(), 1);

    // Explicit identities below the maximum still go through
    store.insert(&named("explicit").with("id", 7)).unwrap();
    assert_eq!(store.read_all().unwrap().len(), 2);
}

#[test]
fn test_counter_write_failure_keeps_insert_successful() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::Monotonic);
    // A directory where the counter file belongs makes every counter write fail
    fs::create_dir(tmp.path().join("scores.csv.seq")).unwrap();

    let first = store.insert(&named("a")).unwrap();
    assert_eq!(first.get("id"), Some(&Value::Integer(1)));

    // The scan of stored identities still prevents reuse
    let second = store.insert(&named("b")).unwrap();
    assert_eq!(second.get("id"), Some(&Value::Integer(2)));
    assert_eq!(ids(&store.read_all().unwrap()), vec![1, 2]);
}

// =============================================================================
// Serialized Concurrency
// =============================================================================

#[test]
fn test_concurrent_inserts_lose_nothing() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 5;

    let tmp = TempDir::new().unwrap();
    let store = Arc::new(open(&tmp, scores_schema(), IdentityPolicy::ReuseMax));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    store.insert(&named(&format!("t{}-{}", t, i))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = store.read_all().unwrap();
    let total = THREADS * PER_THREAD;
    assert_eq!(records.len(), total);

    let distinct: HashSet<i64> = ids(&records).into_iter().collect();
    assert_eq!(distinct.len(), total);
    assert_eq!(distinct, (1..=total as i64).collect());
}

// =============================================================================
// Filters
// =============================================================================

#[test]
fn test_empty_filter_equals_read_all() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);
    for name in ["a", "b", "c"] {
        store.insert(&named(name)).unwrap();
    }

    assert_eq!(store.find(&Filter::new()).unwrap(), store.read_all().unwrap());
}

#[test]
fn test_multi_key_equality_filter() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);
    store.insert(&named("a").with("score", 5)).unwrap();
    store.insert(&named("b").with("score", 5)).unwrap();
    store.insert(&named("a").with("score", 7)).unwrap();

    let found = store
        .find(&Filter::new().eq("name", "a").eq("score", 5))
        .unwrap();
    assert_eq!(ids(&found), vec![1]);

    // A textual filter value is coerced to the field type first
    let found = store.find(&Filter::new().eq("score", "5")).unwrap();
    assert_eq!(ids(&found), vec![1, 2]);
}

#[test]
fn test_comparison_operator_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);

    let err = store.find(&Filter::new().gte("score", 1)).unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedOperator { .. }));
}

#[test]
fn test_find_one_returns_first_match() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);
    store.insert(&named("x")).unwrap();
    store.insert(&named("x")).unwrap();

    let first = store.find_one(&Filter::new().eq("name", "x")).unwrap().unwrap();
    assert_eq!(first.get("id"), Some(&Value::Integer(1)));
    assert!(store.find_one(&Filter::new().eq("name", "y")).unwrap().is_none());
}

// =============================================================================
// Update & Delete
// =============================================================================

#[test]
fn test_update_skips_disallowed_values_and_refreshes_updated_at() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, catalog::tasks().unwrap(), IdentityPolicy::ReuseMax);
    let task = store
        .insert(&Record::new().with("title", "Write docs").with("creator", "ann"))
        .unwrap();

    let changed = store
        .update(
            &Filter::new().eq("task_id", 1),
            &Record::new().with("status", "shelved").with("priority", "urgent"),
        )
        .unwrap();
    assert!(changed);

    let stored = store.find_one(&Filter::new().eq("task_id", 1)).unwrap().unwrap();
    assert_eq!(stored.get("status"), Some(&Value::Text("todo".into())));
    assert_eq!(stored.get("priority"), Some(&Value::Text("urgent".into())));
    let timestamp = |r: &Record| match r.get("updated_at") {
        Some(Value::Timestamp(ts)) => *ts,
        other => panic!("updated_at not a timestamp: {:?}", other),
    };
    assert!(timestamp(&stored) >= timestamp(&task));
}

#[test]
fn test_update_and_delete_without_match() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, scores_schema(), IdentityPolicy::ReuseMax);
    store.insert(&named("a")).unwrap();

    assert!(!store
        .update(&Filter::new().eq("id", 99), &Record::new().with("score", 1))
        .unwrap());
    assert!(!store.delete(&Filter::new().eq("id", 99)).unwrap());
    assert_eq!(store.read_all().unwrap().len(), 1);
}

// =============================================================================
// Uniqueness
// =============================================================================

fn user(username: &str) -> Record {
    Record::new()
        .with("telegram_username", username)
        .with("full_name", username.to_uppercase())
}

#[test]
fn test_unique_field_rejects_duplicate_insert() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, catalog::users().unwrap(), IdentityPolicy::ReuseMax);
    store.insert(&user("alice")).unwrap();

    let err = store.insert(&user("alice")).unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { ref field, .. } if field == "telegram_username"));
    assert_eq!(store.read_all().unwrap().len(), 1);
}

#[test]
fn test_unique_field_rejects_duplicate_update() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, catalog::users().unwrap(), IdentityPolicy::ReuseMax);
    store.insert(&user("alice")).unwrap();
    store.insert(&user("bob")).unwrap();

    let err = store
        .update(
            &Filter::new().eq("telegram_username", "bob"),
            &Record::new().with("telegram_username", "alice"),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { .. }));
    assert!(store
        .find_one(&Filter::new().eq("telegram_username", "bob"))
        .unwrap()
        .is_some());
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_records_read_back_equal_inserted() {
    let tmp = TempDir::new().unwrap();
    let inserted = {
        let store = open(&tmp, catalog::tasks().unwrap(), IdentityPolicy::ReuseMax);
        store
            .insert(
                &Record::new()
                    .with("title", "Plan")
                    .with("creator", "ann")
                    .with("tags", Value::Json(serde_json::json!(["a", "b"]))),
            )
            .unwrap()
    };

    let store = open(&tmp, catalog::tasks().unwrap(), IdentityPolicy::ReuseMax);
    assert_eq!(store.read_all().unwrap(), vec![inserted]);
}
