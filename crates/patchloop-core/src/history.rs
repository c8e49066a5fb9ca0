//! Run history: per-file attempt counters and last outcome.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use patchloop_state::{JsonFileStore, KeyedStore, MemoryStore};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::file_key::FileKey;
use crate::sandbox::ExecutionStatus;

/// Last known state of one file. `attempts` never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptState {
    pub filepath: FileKey,
    pub attempts: u32,
    pub status: ExecutionStatus,
    /// The last success came right after a repair in the same session.
    pub last_fixed: bool,
    /// Stdout of the last run.
    #[serde(default)]
    pub output: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RunHistory {
    store: Arc<dyn KeyedStore<AttemptState>>,
}

impl RunHistory {
    pub fn new(store: Arc<dyn KeyedStore<AttemptState>>) -> Self {
        Self { store }
    }

    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(JsonFileStore::open(path)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn get(&self, filepath: impl AsRef<Path>) -> Result<Option<AttemptState>> {
        let key = FileKey::new(filepath);
        Ok(self.store.get(key.as_str())?)
    }

    pub fn entries(&self) -> Result<BTreeMap<FileKey, AttemptState>> {
        Ok(self
            .store
            .entries()?
            .into_values()
            .map(|state| (state.filepath.clone(), state))
            .collect())
    }

    /// Store `state`, never letting the attempt counter go backwards.
    pub fn record(&self, mut state: AttemptState) -> Result<AttemptState> {
        let key = state.filepath.as_str().to_string();
        let mut stored = None;
        self.store
            .modify(&mut |map: &mut BTreeMap<String, AttemptState>| {
                if let Some(prev) = map.get(&key) {
                    state.attempts = state.attempts.max(prev.attempts);
                }
                map.insert(key.clone(), state.clone());
                stored = Some(state.clone());
            })?;
        Ok(stored.unwrap_or(state))
    }

    pub fn remove(&self, filepath: impl AsRef<Path>) -> Result<Option<AttemptState>> {
        let key = FileKey::new(filepath);
        Ok(self.store.remove(key.as_str())?)
    }

    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<bool> {
        let from = FileKey::new(from);
        let to = FileKey::new(to);
        let mut moved = false;
        self.store
            .modify(&mut |map: &mut BTreeMap<String, AttemptState>| {
                if let Some(mut state) = map.remove(from.as_str()) {
                    state.filepath = to.clone();
                    map.insert(to.as_str().to_string(), state);
                    moved = true;
                }
            })?;
        Ok(moved)
    }
}
