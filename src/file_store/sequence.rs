//! Persisted identity counter
//!
//! `<data file>.seq` holds `{"last": n}`, the highest identity ever issued
//! for the data file. Used by the monotonic identity policy only.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::{StoreError, StoreResult};

#[derive(Debug, Serialize, Deserialize)]
struct SequenceState {
    last: i64,
}

#[derive(Debug, Clone)]
pub struct SequenceFile {
    path: PathBuf,
}

impl SequenceFile {
    pub fn for_data_file(data_file: &Path) -> Self {
        let mut name = data_file.as_os_str().to_os_string();
        name.push(".seq");
        Self {
            path: PathBuf::from(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last issued identity; 0 if the counter file is missing or unreadable.
    ///
    /// Callers combine this with the highest identity present in the data,
    /// so a lost counter never causes a collision.
    pub fn last(&self) -> i64 {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str::<SequenceState>(&content).ok())
            .map(|state| state.last)
            .unwrap_or(0)
    }

    /// Raises the counter to `issued` if it is higher.
    pub fn advance(&self, issued: i64) -> StoreResult<()> {
        let last = self.last();
        if issued <= last {
            return Ok(());
        }

        let json = serde_json::to_string(&SequenceState { last: issued })?;
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))
    }
}
