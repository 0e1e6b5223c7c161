//! CSV-backed record store
//!
//! One file per entity: a header row of schema field names followed by one
//! row per record. Every mutation reads the whole file, applies the change
//! in memory and rewrites the file (temp file, fsync, rename).
//!
//! A single mutex serializes every operation on one store, reads included.
//! Nothing coordinates separate processes; the integrity ledger can only
//! detect such interference after the fact.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use super::codec::TextCodec;
use super::sequence::SequenceFile;
use crate::filter::{Filter, Predicate};
use crate::integrity::{IntegrityLedger, VerifyReport};
use crate::observability::Logger;
use crate::schema::{
    FieldType, IdentityKind, Record, SchemaDescriptor, SequenceFill, Value, ValueCodec,
};
use crate::store::{IdentityPolicy, RecordStore, StoreError, StoreResult};

const BACKEND: &str = "file";

/// Equality term resolved against the schema
struct TextTerm<'a> {
    field: &'a str,
    field_type: FieldType,
    expected: String,
}

/// CSV file store with integrity auditing
pub struct FileStore {
    path: PathBuf,
    schema: SchemaDescriptor,
    ledger: Arc<IntegrityLedger>,
    identity_policy: IdentityPolicy,
    sequence: SequenceFile,
    codec: TextCodec,
    lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`, creating the file with a header row if it
    /// does not exist.
    ///
    /// A new file is recorded in the ledger as `initialize`; an existing
    /// file the ledger has never seen is recorded as `register`. Opening an
    /// already-initialized store changes nothing on disk.
    pub fn open(
        path: impl Into<PathBuf>,
        schema: SchemaDescriptor,
        ledger: Arc<IntegrityLedger>,
        identity_policy: IdentityPolicy,
    ) -> StoreResult<Self> {
        let path = path.into();
        let sequence = SequenceFile::for_data_file(&path);
        let store = Self {
            path,
            schema,
            ledger,
            identity_policy,
            sequence,
            codec: TextCodec,
            lock: Mutex::new(()),
        };

        let created = !store.path.exists();
        if created {
            store.write_records(&[])?;
            store.record_hash("initialize");
        } else if store.ledger.stored_entry(&store.path).is_none() {
            store.record_hash("register");
        }

        let path_str = store.path.display().to_string();
        Logger::info(
            "STORE_INITIALIZED",
            &[
                ("backend", BACKEND),
                ("created", if created { "true" } else { "false" }),
                ("entity", store.schema.entity()),
                ("path", &path_str),
            ],
        );

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ledger(&self) -> &Arc<IntegrityLedger> {
        &self.ledger
    }

    pub fn identity_policy(&self) -> IdentityPolicy {
        self.identity_policy
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ==================
    // Integrity
    // ==================

    /// Compares the file against the ledger and warns on mismatch.
    /// Never fails the calling operation.
    fn audit(&self, operation: &str) {
        let path_str = self.path.display().to_string();
        match self.ledger.verify(&self.path) {
            Ok(report) if report.file_exists && !report.valid => {
                let stored = report.stored_hash.as_deref().unwrap_or("none");
                let current = report.current_hash.as_deref().unwrap_or("none");
                Logger::warn(
                    "INTEGRITY_MISMATCH",
                    &[
                        ("current_hash", current),
                        ("operation", operation),
                        ("path", &path_str),
                        ("stored_hash", stored),
                    ],
                );
            }
            Ok(_) => {}
            Err(e) => Logger::warn(
                "INTEGRITY_CHECK_FAILED",
                &[
                    ("operation", operation),
                    ("path", &path_str),
                    ("reason", &e.to_string()),
                ],
            ),
        }
    }

    /// Records the file's current hash. A ledger failure is logged, not
    /// raised: the data change it follows has already happened.
    fn record_hash(&self, reason: &str) {
        if let Err(e) = self.ledger.update(&self.path, reason) {
            let path_str = self.path.display().to_string();
            Logger::error(
                "INTEGRITY_UPDATE_FAILED",
                &[
                    ("path", &path_str),
                    ("reason", reason),
                    ("error", &e.to_string()),
                ],
            );
        }
    }

    /// Raises the identity counter. A failure is logged, not raised: the
    /// record is already stored, and the next insert still scans past it.
    fn advance_sequence(&self, issued: i64) {
        if let Err(e) = self.sequence.advance(issued) {
            let path_str = self.sequence.path().display().to_string();
            let issued = issued.to_string();
            Logger::error(
                "SEQUENCE_UPDATE_FAILED",
                &[
                    ("error", &e.to_string()),
                    ("issued", &issued),
                    ("path", &path_str),
                ],
            );
        }
    }

    /// Recomputes and persists the ledger hash without touching the data.
    pub fn force_integrity_refresh(&self, reason: &str) -> StoreResult<String> {
        let _guard = self.guard();
        if !self.path.exists() {
            self.write_records(&[])?;
        }
        Ok(self.ledger.update(&self.path, reason)?)
    }

    /// Ledger verification report for this store's file
    pub fn integrity_status(&self) -> StoreResult<VerifyReport> {
        let _guard = self.guard();
        Ok(self.ledger.verify(&self.path)?)
    }

    // ==================
    // File I/O
    // ==================

    /// Reads every record, recreating an empty file if it is missing.
    fn load_records(&self) -> StoreResult<Vec<Record>> {
        if !self.path.exists() {
            self.write_records(&[])?;
            self.record_hash("initialize");
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| StoreError::csv(&self.path, e))?;

        let headers = reader
            .headers()
            .map_err(|e| StoreError::csv(&self.path, e))?
            .clone();
        let columns: Vec<Option<usize>> = self
            .schema
            .fields()
            .map(|(name, _)| headers.iter().position(|h| h == name))
            .collect();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| StoreError::csv(&self.path, e))?;
            records.push(self.decode_row(&row, &columns));
        }
        Ok(records)
    }

    fn decode_row(&self, row: &StringRecord, columns: &[Option<usize>]) -> Record {
        self.schema
            .fields()
            .zip(columns)
            .map(|((name, spec), column)| {
                let cell = column.and_then(|i| row.get(i)).unwrap_or_default();
                (
                    name.to_string(),
                    self.codec.decode(&spec.field_type, cell.to_string()),
                )
            })
            .collect()
    }

    /// Rewrites the whole file: header plus `records`.
    fn write_records(&self, records: &[Record]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        let mut writer = WriterBuilder::new().from_writer(file);

        writer
            .write_record(self.schema.field_names())
            .map_err(|e| StoreError::csv(&tmp_path, e))?;
        for record in records {
            let row: Vec<String> = self
                .schema
                .fields()
                .map(|(name, spec)| match record.get(name) {
                    Some(value) => self.codec.encode(&spec.field_type, value),
                    None => String::new(),
                })
                .collect();
            writer
                .write_record(&row)
                .map_err(|e| StoreError::csv(&tmp_path, e))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| StoreError::io(&tmp_path, e.into_error()))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))
    }

    // ==================
    // Predicates
    // ==================

    /// Resolves a filter into textual equality terms.
    ///
    /// Returns `None` if some term names a field the schema does not
    /// declare: such a filter matches nothing.
    fn resolve<'a>(&'a self, filter: &Filter) -> StoreResult<Option<Vec<TextTerm<'a>>>> {
        let predicate = Predicate::parse(filter);
        if let Some(c) = predicate.first_non_equality() {
            return Err(StoreError::UnsupportedOperator {
                field: c.field.clone(),
                operator: c.operator.to_string(),
                backend: BACKEND,
            });
        }

        let mut terms = Vec::with_capacity(predicate.comparisons().len());
        for comparison in predicate.comparisons() {
            let Some((field, spec)) = self
                .schema
                .fields()
                .find(|(name, _)| *name == comparison.field)
            else {
                return Ok(None);
            };
            let operand = comparison.operand.clone().into_scalar();
            terms.push(TextTerm {
                field,
                field_type: spec.field_type,
                expected: self.codec.filter_text(&spec.field_type, &operand),
            });
        }
        Ok(Some(terms))
    }

    fn matches(&self, record: &Record, terms: &[TextTerm<'_>]) -> bool {
        terms.iter().all(|term| {
            let actual = record
                .get(term.field)
                .map(|v| self.codec.encode(&term.field_type, v))
                .unwrap_or_default();
            actual == term.expected
        })
    }

    // ==================
    // Identity & uniqueness
    // ==================

    fn max_identity(&self, records: &[Record]) -> i64 {
        let Some(identity) = self.schema.identity() else {
            return 0;
        };
        records
            .iter()
            .filter_map(|r| r.get(&identity.field).and_then(|v| v.as_integer()))
            .max()
            .unwrap_or(0)
    }

    fn next_identity(&self, records: &[Record]) -> StoreResult<i64> {
        let max = self.max_identity(records);
        let base = match self.identity_policy {
            IdentityPolicy::ReuseMax => max,
            IdentityPolicy::Monotonic => max.max(self.sequence.last()),
        };
        base.checked_add(1).ok_or_else(|| StoreError::IdentityExhausted {
            entity: self.schema.entity().to_string(),
        })
    }

    /// Rejects `candidate` if a unique field value is already taken by a
    /// record in `existing`.
    fn check_unique(&self, candidate: &Record, existing: &[Record]) -> StoreResult<()> {
        for field in self.schema.unique_fields() {
            let Some(value) = candidate.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let field_type = self
                .schema
                .field(field)
                .map(|s| s.field_type)
                .unwrap_or(FieldType::Text);
            let text = self.codec.encode(&field_type, value);
            if text.is_empty() {
                continue;
            }
            let taken = existing.iter().any(|r| {
                r.get(field)
                    .map(|v| self.codec.encode(&field_type, v) == text)
                    .unwrap_or(false)
            });
            if taken {
                return Err(StoreError::UniqueViolation {
                    field: field.to_string(),
                    value: text,
                });
            }
        }
        Ok(())
    }

    /// Rejects a record set where a changed unique field holds duplicates.
    fn check_unique_after_update(&self, records: &[Record], changes: &Record) -> StoreResult<()> {
        for field in self.schema.unique_fields().filter(|f| changes.contains(f)) {
            let field_type = self
                .schema
                .field(field)
                .map(|s| s.field_type)
                .unwrap_or(FieldType::Text);
            let mut seen = HashSet::new();
            for record in records {
                let Some(value) = record.get(field).filter(|v| !v.is_null()) else {
                    continue;
                };
                let text = self.codec.encode(&field_type, value);
                if !text.is_empty() && !seen.insert(text.clone()) {
                    return Err(StoreError::UniqueViolation {
                        field: field.to_string(),
                        value: text,
                    });
                }
            }
        }
        Ok(())
    }

    fn identity_text(&self, record: &Record) -> String {
        self.schema
            .identity()
            .and_then(|id| record.get(&id.field))
            .map(|v| v.to_text())
            .unwrap_or_default()
    }

    fn log_mutation(&self, event: &str, fields: &[(&str, &str)]) {
        let mut all: Vec<(&str, &str)> = vec![("backend", BACKEND), ("entity", self.schema.entity())];
        all.extend_from_slice(fields);
        Logger::info(event, &all);
    }
}

impl RecordStore for FileStore {
    fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    fn read_all(&self) -> StoreResult<Vec<Record>> {
        let _guard = self.guard();
        self.audit("read_all");
        let records = self.load_records()?;
        self.audit("read_all");
        Ok(records)
    }

    fn find(&self, filter: &Filter) -> StoreResult<Vec<Record>> {
        let _guard = self.guard();
        let terms = self.resolve(filter)?;

        self.audit("find");
        let records = self.load_records()?;
        self.audit("find");

        let Some(terms) = terms else {
            return Ok(Vec::new());
        };
        Ok(records
            .into_iter()
            .filter(|r| self.matches(r, &terms))
            .collect())
    }

    fn insert(&self, data: &Record) -> StoreResult<Record> {
        let _guard = self.guard();
        self.audit("insert");

        let mut records = self.load_records()?;
        let fill = match self.schema.identity() {
            // A caller-supplied identity needs no generated one
            Some(id)
                if id.kind == IdentityKind::Sequence
                    && data.get(&id.field).map_or(true, Value::is_null) =>
            {
                SequenceFill::Assign(self.next_identity(&records)?)
            }
            _ => SequenceFill::Deferred,
        };
        let record = self.schema.validate_and_fill(data, &self.codec, fill)?;
        self.check_unique(&record, &records)?;

        records.push(record.clone());
        self.write_records(&records)?;
        self.record_hash("insert");

        if self.identity_policy == IdentityPolicy::Monotonic {
            let issued = self
                .schema
                .identity()
                .filter(|id| id.kind == IdentityKind::Sequence)
                .and_then(|id| record.get(&id.field))
                .and_then(|v| v.as_integer());
            if let Some(issued) = issued {
                self.advance_sequence(issued);
            }
        }

        let id = self.identity_text(&record);
        self.log_mutation("STORE_INSERT", &[("id", &id)]);
        Ok(record)
    }

    fn update(&self, filter: &Filter, changes: &Record) -> StoreResult<bool> {
        let _guard = self.guard();
        let terms = self.resolve(filter)?;
        self.audit("update");

        let Some(terms) = terms else {
            return Ok(false);
        };

        let mut records = self.load_records()?;
        let prepared = self.schema.prepare_changes(changes);

        let mut matched = 0usize;
        for record in records.iter_mut() {
            if !self.matches(record, &terms) {
                continue;
            }
            matched += 1;
            for (name, value) in prepared.iter() {
                record.set(name, value.clone());
            }
        }

        if matched == 0 {
            return Ok(false);
        }

        self.check_unique_after_update(&records, &prepared)?;
        self.write_records(&records)?;
        self.record_hash("update");

        let count = matched.to_string();
        self.log_mutation("STORE_UPDATE", &[("matched", &count)]);
        Ok(true)
    }

    fn delete(&self, filter: &Filter) -> StoreResult<bool> {
        let _guard = self.guard();
        let terms = self.resolve(filter)?;
        self.audit("delete");

        let Some(terms) = terms else {
            return Ok(false);
        };

        let records = self.load_records()?;
        let before = records.len();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|r| !self.matches(r, &terms))
            .collect();
        let removed = before - kept.len();

        if removed == 0 {
            return Ok(false);
        }

        self.write_records(&kept)?;
        self.record_hash("delete");

        let count = removed.to_string();
        self.log_mutation("STORE_DELETE", &[("removed", &count)]);
        Ok(true)
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("entity", &self.schema.entity())
            .field("identity_policy", &self.identity_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, Value};
    use tempfile::TempDir;

    fn scores_schema() -> SchemaDescriptor {
        SchemaDescriptor::builder("scores")
            .field("id", FieldSpec::serial())
            .field("name", FieldSpec::text().required())
            .field("score", FieldSpec::integer().default_value(0))
            .build()
            .unwrap()
    }

    fn open(tmp: &TempDir) -> FileStore {
        let ledger = Arc::new(IntegrityLedger::open(tmp.path().join("hashes.json")));
        FileStore::open(
            tmp.path().join("scores.csv"),
            scores_schema(),
            ledger,
            IdentityPolicy::ReuseMax,
        )
        .unwrap()
    }

    #[test]
    fn test_open_creates_header_and_ledger_entry() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "id,name,score\n");
        let entry = store.ledger().stored_entry(store.path()).unwrap();
        assert_eq!(entry.reason, "initialize");
    }

    #[test]
    fn test_existing_file_registered() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("scores.csv"), "id,name,score\n1,a,3\n").unwrap();
        let store = open(&tmp);

        let entry = store.ledger().stored_entry(store.path()).unwrap();
        assert_eq!(entry.reason, "register");
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_insert_writes_typed_text() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        let record = store.insert(&Record::new().with("name", "a")).unwrap();

        assert_eq!(record.get("id"), Some(&Value::Integer(1)));
        assert_eq!(record.get("score"), Some(&Value::Integer(0)));
        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "id,name,score\n1,a,0\n");
    }

    #[test]
    fn test_read_missing_file_recreates_header() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        fs::remove_file(store.path()).unwrap();

        assert!(store.read_all().unwrap().is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn test_operator_suffix_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        let err = store.find(&Filter::new().gte("score", 1)).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_unknown_filter_field_matches_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        store.insert(&Record::new().with("name", "a")).unwrap();
        assert!(store.find(&Filter::new().eq("nickname", "a")).unwrap().is_empty());
        assert!(!store.delete(&Filter::new().eq("nickname", "a")).unwrap());
    }

    #[test]
    fn test_columns_mapped_by_header_name() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("scores.csv"), "name,id\nb,4\n").unwrap();
        let store = open(&tmp);

        let records = store.read_all().unwrap();
        assert_eq!(records[0].fields().collect::<Vec<_>>(), vec!["id", "name", "score"]);
        assert_eq!(records[0].get("id"), Some(&Value::Integer(4)));
        assert_eq!(records[0].get("score"), Some(&Value::Null));
    }

    #[test]
    fn test_update_refresh_records_reason() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        store.insert(&Record::new().with("name", "a")).unwrap();
        store
            .update(&Filter::new().eq("id", 1), &Record::new().with("score", 2))
            .unwrap();
        let entry = store.ledger().stored_entry(store.path()).unwrap();
        assert_eq!(entry.reason, "update");

        store.force_integrity_refresh("manual").unwrap();
        let entry = store.ledger().stored_entry(store.path()).unwrap();
        assert_eq!(entry.reason, "manual");
        assert!(store.integrity_status().unwrap().valid);
    }
}
