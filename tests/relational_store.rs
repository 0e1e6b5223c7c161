//! Relational Store Tests
//!
//! SQLite backend behavior beyond the shared contract:
//! - Comparison, IN and LIKE operators
//! - Database-assigned identities under both policies
//! - Unique indexes
//! - Batch insert atomicity
//! - Table introspection and raw SQL
//! - Pool lifecycle

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use recordstore::config::RelationalConfig;
use recordstore::filter::Filter;
use recordstore::relational::RelationalStore;
use recordstore::schema::{catalog, FieldSpec, Record, SchemaDescriptor, Value};
use recordstore::store::{IdentityPolicy, RecordStore, StoreError};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn people_schema() -> SchemaDescriptor {
    SchemaDescriptor::builder("people")
        .field("id", FieldSpec::serial())
        .field("name", FieldSpec::text().required().indexed())
        .field("age", FieldSpec::integer())
        .field("active", FieldSpec::boolean().default_value(true))
        .build()
        .unwrap()
}

fn config(tmp: &TempDir) -> RelationalConfig {
    RelationalConfig {
        database_path: tmp.path().join("store.db"),
        ..RelationalConfig::default()
    }
}

fn open(tmp: &TempDir, schema: SchemaDescriptor, policy: IdentityPolicy) -> RelationalStore {
    RelationalStore::open(&config(tmp), schema, policy).unwrap()
}

fn person(name: &str, age: i64) -> Record {
    Record::new().with("name", name).with("age", age)
}

fn seeded(tmp: &TempDir) -> RelationalStore {
    let store = open(tmp, people_schema(), IdentityPolicy::ReuseMax);
    for (name, age) in [("Ann", 25), ("bob", 30), ("Cid", 41), ("dana", 30), ("Eve", 19)] {
        store.insert(&person(name, age)).unwrap();
    }
    store
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("name").map(Value::to_text).unwrap_or_default())
        .collect()
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn test_gte_returns_only_matching() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);

    let found = store.find(&Filter::new().gte("age", 30)).unwrap();
    assert_eq!(names(&found), vec!["bob", "Cid", "dana"]);
    assert!(found
        .iter()
        .all(|r| r.get("age").and_then(Value::as_integer).unwrap() >= 30));
}

#[test]
fn test_suffix_keys_equal_builder_methods() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);

    let by_key = store.find(&Filter::new().with("age__lt", 26)).unwrap();
    let by_method = store.find(&Filter::new().lt("age", 26)).unwrap();
    assert_eq!(by_key, by_method);
    assert_eq!(names(&by_key), vec!["Ann", "Eve"]);
}

#[test]
fn test_in_returns_subset_regardless_of_order() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);

    let found = store.find(&Filter::new().any_of("id", [3, 1, 2])).unwrap();
    let ids: HashSet<i64> = found
        .iter()
        .map(|r| r.get("id").and_then(Value::as_integer).unwrap())
        .collect();
    assert_eq!(ids, HashSet::from([1, 2, 3]));
}

#[test]
fn test_empty_in_matches_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);
    let empty: [i64; 0] = [];
    assert!(store.find(&Filter::new().any_of("id", empty)).unwrap().is_empty());
}

#[test]
fn test_like_is_case_sensitive_ilike_is_not() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);

    assert_eq!(names(&store.find(&Filter::new().like("name", "d%")).unwrap()), vec!["dana"]);
    assert_eq!(
        names(&store.find(&Filter::new().ilike("name", "d%")).unwrap()),
        vec!["dana"]
    );
    assert_eq!(
        names(&store.find(&Filter::new().ilike("name", "c%")).unwrap()),
        vec!["Cid"]
    );
    assert!(store.find(&Filter::new().like("name", "c%")).unwrap().is_empty());
}

#[test]
fn test_combined_terms_are_conjunctive() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);

    let found = store
        .find(&Filter::new().eq("age", 30).like("name", "d%"))
        .unwrap();
    assert_eq!(names(&found), vec!["dana"]);
    assert_eq!(store.count(&Filter::new().eq("age", 30)).unwrap(), 2);
    assert_eq!(store.count(&Filter::new()).unwrap(), 5);
}

#[test]
fn test_unknown_filter_field_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);
    let err = store.find(&Filter::new().eq("height", 180)).unwrap_err();
    assert!(matches!(err, StoreError::InvalidFilter(_)));
}

// =============================================================================
// Identities
// =============================================================================

#[test]
fn test_insert_returns_database_assigned_identity() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, people_schema(), IdentityPolicy::ReuseMax);

    let first = store.insert(&person("a", 1)).unwrap();
    let second = store.insert(&person("b", 2)).unwrap();

    assert_eq!(first.get("id"), Some(&Value::Integer(1)));
    assert_eq!(second.get("id"), Some(&Value::Integer(2)));
    assert_eq!(second.get("active"), Some(&Value::Boolean(true)));
}

#[test]
fn test_reuse_max_and_monotonic_after_deleting_maximum() {
    let tmp_reuse = TempDir::new().unwrap();
    let reuse = open(&tmp_reuse, people_schema(), IdentityPolicy::ReuseMax);
    let tmp_mono = TempDir::new().unwrap();
    let mono = open(&tmp_mono, people_schema(), IdentityPolicy::Monotonic);

    for store in [&reuse, &mono] {
        store.insert(&person("a", 1)).unwrap();
        store.insert(&person("b", 2)).unwrap();
        assert!(store.delete(&Filter::new().eq("id", 2)).unwrap());
    }

    assert_eq!(reuse.insert(&person("c", 3)).unwrap().get("id"), Some(&Value::Integer(2)));
    assert_eq!(mono.insert(&person("c", 3)).unwrap().get("id"), Some(&Value::Integer(3)));
}

#[test]
fn test_concurrent_inserts_get_distinct_identities() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(open(&tmp, people_schema(), IdentityPolicy::ReuseMax));

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..5)
                    .map(|i| {
                        let record = store.insert(&person(&format!("{}-{}", t, i), i)).unwrap();
                        record.get("id").and_then(Value::as_integer).unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: HashSet<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(ids.len(), 30);
    assert_eq!(store.read_all().unwrap().len(), 30);
}

// =============================================================================
// Uniqueness
// =============================================================================

#[test]
fn test_unique_index_violation_mapped() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, catalog::users().unwrap(), IdentityPolicy::ReuseMax);
    let user = Record::new()
        .with("telegram_username", "alice")
        .with("full_name", "Alice");

    store.insert(&user).unwrap();
    let err = store.insert(&user).unwrap_err();

    match err {
        StoreError::UniqueViolation { field, value } => {
            assert_eq!(field, "telegram_username");
            assert_eq!(value, "alice");
        }
        other => panic!("expected unique violation, got {:?}", other),
    }
    assert_eq!(store.read_all().unwrap().len(), 1);
}

// =============================================================================
// Batch Insert
// =============================================================================

#[test]
fn test_batch_insert_all_or_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, catalog::users().unwrap(), IdentityPolicy::ReuseMax);
    let user = |name: &str| {
        Record::new()
            .with("telegram_username", name)
            .with("full_name", name)
    };

    let stored = store.batch_insert(&[user("a"), user("b")]).unwrap();
    assert_eq!(stored.len(), 2);

    // Duplicate inside the batch: nothing from it persists
    let err = store.batch_insert(&[user("c"), user("a")]).unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { .. }));
    assert_eq!(store.read_all().unwrap().len(), 2);

    // Validation failure rejects the batch before touching the table
    let err = store
        .batch_insert(&[user("d"), Record::new().with("full_name", "nobody")])
        .unwrap_err();
    assert!(matches!(err, StoreError::Schema(_)));
    assert_eq!(store.read_all().unwrap().len(), 2);
}

// =============================================================================
// Introspection & Raw SQL
// =============================================================================

#[test]
fn test_table_info_describes_schema() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);

    let info = store.get_table_info().unwrap();
    assert_eq!(info.table, "people");
    assert_eq!(info.row_count, 5);
    assert_eq!(
        info.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["id", "name", "age", "active"]
    );
    assert!(info.column("id").unwrap().primary_key);
    assert!(info.column("name").unwrap().not_null);

    let index = info.index("idx_people_name").unwrap();
    assert!(!index.unique);
    assert_eq!(index.columns, vec!["name"]);
}

#[test]
fn test_execute_raw_query_and_statement() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);

    let result = store
        .execute_raw(
            "SELECT name, age FROM people WHERE age > ? ORDER BY age",
            &[Value::Integer(29)],
        )
        .unwrap();
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[2].get("name"), Some(&Value::Text("Cid".into())));
    assert_eq!(result.rows[2].get("age"), Some(&Value::Integer(41)));

    let result = store
        .execute_raw("UPDATE people SET age = age + 1 WHERE age = ?", &[Value::Integer(30)])
        .unwrap();
    assert!(result.rows.is_empty());
    assert_eq!(result.affected, 2);
    assert_eq!(store.count(&Filter::new().eq("age", 31)).unwrap(), 2);
}

// =============================================================================
// Update & Lifecycle
// =============================================================================

#[test]
fn test_update_with_operator_filter() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);

    let changed = store
        .update(&Filter::new().lt("age", 20), &Record::new().with("active", false))
        .unwrap();
    assert!(changed);

    let inactive = store.find(&Filter::new().eq("active", false)).unwrap();
    assert_eq!(names(&inactive), vec!["Eve"]);
}

#[test]
fn test_reopen_keeps_rows() {
    let tmp = TempDir::new().unwrap();
    {
        let store = seeded(&tmp);
        store.close();
    }
    let store = open(&tmp, people_schema(), IdentityPolicy::ReuseMax);
    assert_eq!(store.read_all().unwrap().len(), 5);
}

#[test]
fn test_closed_store_refuses_operations() {
    let tmp = TempDir::new().unwrap();
    let store = seeded(&tmp);
    store.close();
    assert!(matches!(store.read_all(), Err(StoreError::Closed)));
}
