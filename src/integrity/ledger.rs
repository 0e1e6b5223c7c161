//! Persisted hash journal
//!
//! The ledger file is a JSON object keyed by absolute file path. It is
//! re-read on every call, so several ledgers (or processes) sharing one
//! ledger file observe each other's updates. Writers hold the ledger lock
//! across the whole load-modify-save cycle and save by writing a temp
//! file, fsyncing it and renaming it over the old ledger.
//!
//! A missing or unparsable ledger file loads as empty.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::UNIX_EPOCH;

use chrono::Local;
use serde::{Deserialize, Serialize};

use super::errors::{IntegrityError, IntegrityResult};
use super::hash::calculate_hash;
use crate::observability::Logger;

/// Last known good state of one monitored file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashEntry {
    /// Absolute path; the ledger key, not repeated in the file
    #[serde(skip)]
    pub path: String,
    /// SHA-256, 64 lowercase hex characters
    pub hash: String,
    /// Local ISO-8601 time of the update
    pub timestamp: String,
    pub reason: String,
    pub file_size: u64,
    /// Modification time, epoch seconds
    pub last_modified: f64,
}

/// Result of verifying one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    pub valid: bool,
    pub message: String,
    pub current_hash: Option<String>,
    pub stored_hash: Option<String>,
    pub timestamp: Option<String>,
    pub file_exists: bool,
}

/// A ledger entry re-verified against the file system
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoredFile {
    pub path: String,
    pub stored_hash: String,
    pub current_hash: Option<String>,
    pub timestamp: String,
    pub file_exists: bool,
    pub valid: bool,
    pub reason: String,
    pub file_size: u64,
    pub last_modified: f64,
}

/// All monitored files partitioned by current status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyAllReport {
    pub valid: Vec<MonitoredFile>,
    pub invalid: Vec<MonitoredFile>,
    pub total_monitored: usize,
    pub total_valid: usize,
    pub total_invalid: usize,
}

impl VerifyAllReport {
    pub fn all_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Absolute form of `path`, used as the ledger key
pub fn ledger_key(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Durable "last known good" hash per monitored path
#[derive(Debug)]
pub struct IntegrityLedger {
    ledger_path: PathBuf,
    lock: Mutex<()>,
}

impl IntegrityLedger {
    /// Opens a ledger backed by `ledger_path`. The file is created on the
    /// first update.
    pub fn open(ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            ledger_path: ledger_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self) -> BTreeMap<String, HashEntry> {
        let content = match fs::read_to_string(&self.ledger_path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };

        match serde_json::from_str::<BTreeMap<String, HashEntry>>(&content) {
            Ok(mut entries) => {
                for (key, entry) in entries.iter_mut() {
                    entry.path = key.clone();
                }
                entries
            }
            Err(e) => {
                let ledger = self.ledger_path.display().to_string();
                Logger::warn(
                    "LEDGER_LOAD_FAILED",
                    &[("ledger", &ledger), ("reason", &e.to_string())],
                );
                BTreeMap::new()
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, HashEntry>) -> IntegrityResult<()> {
        let json = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.ledger_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| IntegrityError::io(parent, e))?;
            }
        }

        let mut tmp_name = self.ledger_path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path).map_err(|e| IntegrityError::io(&tmp_path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| IntegrityError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| IntegrityError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &self.ledger_path)
            .map_err(|e| IntegrityError::io(&self.ledger_path, e))
    }

    /// Stored entry for `path`, if any
    pub fn stored_entry(&self, path: &Path) -> Option<HashEntry> {
        self.load().remove(&ledger_key(path))
    }

    /// Stored hash for `path`, if any
    pub fn stored_hash(&self, path: &Path) -> Option<String> {
        self.stored_entry(path).map(|entry| entry.hash)
    }

    /// Compares the current hash of `path` with the stored one.
    ///
    /// A missing file is reported as invalid, not raised.
    pub fn verify(&self, path: &Path) -> IntegrityResult<VerifyReport> {
        if !path.exists() {
            return Ok(VerifyReport {
                valid: false,
                message: format!("File not found: {}", path.display()),
                current_hash: None,
                stored_hash: None,
                timestamp: None,
                file_exists: false,
            });
        }

        let current = calculate_hash(path)?;
        let stored = self.stored_entry(path);
        let (valid, message) = match &stored {
            Some(entry) if entry.hash == current => (true, "Hash matches"),
            Some(_) => (false, "Hash mismatch"),
            None => (false, "No stored hash"),
        };

        Ok(VerifyReport {
            valid,
            message: message.to_string(),
            current_hash: Some(current),
            stored_hash: stored.as_ref().map(|e| e.hash.clone()),
            timestamp: stored.map(|e| e.timestamp),
            file_exists: true,
        })
    }

    /// Recomputes and persists the entry for `path`. Returns the new hash.
    pub fn update(&self, path: &Path, reason: &str) -> IntegrityResult<String> {
        let _guard = self.guard();

        let hash = calculate_hash(path)?;
        let metadata = fs::metadata(path).map_err(|e| IntegrityError::io(path, e))?;
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let key = ledger_key(path);
        let mut entries = self.load();
        entries.insert(
            key.clone(),
            HashEntry {
                path: key.clone(),
                hash: hash.clone(),
                timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
                reason: reason.to_string(),
                file_size: metadata.len(),
                last_modified,
            },
        );
        self.save(&entries)?;

        Logger::info(
            "INTEGRITY_UPDATED",
            &[("hash", &hash), ("path", &key), ("reason", reason)],
        );

        Ok(hash)
    }

    /// Forgets `path`. Returns whether an entry existed.
    pub fn remove(&self, path: &Path) -> IntegrityResult<bool> {
        let _guard = self.guard();

        let mut entries = self.load();
        if entries.remove(&ledger_key(path)).is_none() {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    /// Every ledger entry with its file re-hashed now
    pub fn list_monitored(&self) -> IntegrityResult<Vec<MonitoredFile>> {
        let entries = self.load();
        let mut monitored = Vec::with_capacity(entries.len());

        for (key, entry) in entries {
            let path = Path::new(&key);
            let file_exists = path.exists();
            let current_hash = if file_exists {
                Some(calculate_hash(path)?)
            } else {
                None
            };
            let valid = current_hash.as_deref() == Some(entry.hash.as_str());

            monitored.push(MonitoredFile {
                path: key,
                stored_hash: entry.hash,
                current_hash,
                timestamp: entry.timestamp,
                file_exists,
                valid,
                reason: entry.reason,
                file_size: entry.file_size,
                last_modified: entry.last_modified,
            });
        }

        Ok(monitored)
    }

    /// Partitions monitored files into valid and invalid. Missing files are
    /// invalid.
    pub fn verify_all(&self) -> IntegrityResult<VerifyAllReport> {
        let monitored = self.list_monitored()?;
        let total_monitored = monitored.len();
        let (valid, invalid): (Vec<_>, Vec<_>) = monitored.into_iter().partition(|f| f.valid);

        Ok(VerifyAllReport {
            total_valid: valid.len(),
            total_invalid: invalid.len(),
            total_monitored,
            valid,
            invalid,
        })
    }
}
