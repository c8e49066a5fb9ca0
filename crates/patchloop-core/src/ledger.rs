//! Error ledger: the latest failure per file, durable across restarts.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use patchloop_state::{JsonFileStore, KeyedStore, MemoryStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PatchloopError, Result};
use crate::file_key::FileKey;

/// The most recent failure recorded for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub filepath: FileKey,
    pub error_message: String,
    pub traceback: String,
    pub timestamp: DateTime<Utc>,
}

/// Persistent map of normalized path to [`ErrorRecord`].
///
/// At most one record exists per file; a new record replaces the old one.
#[derive(Clone)]
pub struct ErrorLedger {
    store: Arc<dyn KeyedStore<ErrorRecord>>,
}

impl ErrorLedger {
    pub fn new(store: Arc<dyn KeyedStore<ErrorRecord>>) -> Self {
        Self { store }
    }

    /// Ledger backed by a JSON file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(JsonFileStore::open(path)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Record a failure for `filepath`, replacing any earlier one.
    pub fn record(
        &self,
        filepath: impl AsRef<Path>,
        error_message: impl Into<String>,
        traceback: impl Into<String>,
    ) -> Result<ErrorRecord> {
        let key = FileKey::new(filepath);
        let record = ErrorRecord {
            filepath: key.clone(),
            error_message: error_message.into(),
            traceback: traceback.into(),
            timestamp: Utc::now(),
        };
        let previous = self.store.put(key.as_str(), record.clone())?;
        debug!(filepath = %key, replaced = previous.is_some(), "error recorded");
        Ok(record)
    }

    /// Most recent record for `filepath`, or [`PatchloopError::LedgerMiss`].
    pub fn latest(&self, filepath: impl AsRef<Path>) -> Result<ErrorRecord> {
        let key = FileKey::new(filepath);
        self.store
            .get(key.as_str())?
            .ok_or_else(|| PatchloopError::LedgerMiss(key.to_string()))
    }

    /// All records, ordered by path.
    pub fn entries(&self) -> Result<BTreeMap<FileKey, ErrorRecord>> {
        Ok(self
            .store
            .entries()?
            .into_values()
            .map(|record| (record.filepath.clone(), record))
            .collect())
    }

    /// Drop the record for `filepath`. Returns it if one existed.
    pub fn clear(&self, filepath: impl AsRef<Path>) -> Result<Option<ErrorRecord>> {
        let key = FileKey::new(filepath);
        Ok(self.store.remove(key.as_str())?)
    }

    /// Move a record along with a renamed file.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<bool> {
        let from = FileKey::new(from);
        let to = FileKey::new(to);
        let mut moved = false;
        self.store
            .modify(&mut |map: &mut BTreeMap<String, ErrorRecord>| {
                if let Some(mut record) = map.remove(from.as_str()) {
                    record.filepath = to.clone();
                    map.insert(to.as_str().to_string(), record);
                    moved = true;
                }
            })?;
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_without_record_is_a_miss() {
        let ledger = ErrorLedger::in_memory();
        let err = ledger.latest("nothing.py").unwrap_err();
        assert!(err.is_ledger_miss());
    }

    #[test]
    fn test_record_normalizes_key() {
        let ledger = ErrorLedger::in_memory();
        ledger
            .record("./gen/../bad.py", "ZeroDivisionError", "tb")
            .unwrap();
        let rec = ledger.latest("bad.py").unwrap();
        assert_eq!(rec.filepath.as_str(), "bad.py");
        assert_eq!(rec.error_message, "ZeroDivisionError");
    }

    #[test]
    fn test_clear_and_rename() {
        let ledger = ErrorLedger::in_memory();
        ledger.record("a.py", "boom", "tb").unwrap();
        assert!(ledger.rename("a.py", "b.py").unwrap());
        assert!(ledger.latest("a.py").unwrap_err().is_ledger_miss());
        assert_eq!(ledger.latest("b.py").unwrap().filepath.as_str(), "b.py");

        assert!(ledger.clear("b.py").unwrap().is_some());
        assert!(ledger.clear("b.py").unwrap().is_none());
        assert!(ledger.entries().unwrap().is_empty());
    }
}
