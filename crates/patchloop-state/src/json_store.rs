use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::storage_traits::{KeyedStore, StorageResult};

/// Filesystem-backed keyed store: one pretty-printed JSON object per file.
///
/// Writes go to a temp file in the same directory and are renamed over the
/// target, so readers only ever see the old map or the new one.
pub struct JsonFileStore<V> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonFileStore<V> {
    /// Open a store backed by `path`. The file is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            _value: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<V> JsonFileStore<V>
where
    V: Serialize + DeserializeOwned,
{
    fn load(&self) -> StorageResult<BTreeMap<String, V>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, map: &BTreeMap<String, V>) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let json = serde_json::to_vec_pretty(map)?;

        // Atomic write: temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StorageError::io(&dir, e))?;
        tmp.write_all(&json)
            .map_err(|e| StorageError::io(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::io(&self.path, e.error))?;

        tracing::debug!(path = %self.path.display(), entries = map.len(), "store persisted");
        Ok(())
    }
}

impl<V> KeyedStore<V> for JsonFileStore<V>
where
    V: Serialize + DeserializeOwned,
{
    fn entries(&self) -> StorageResult<BTreeMap<String, V>> {
        self.load()
    }

    fn modify(&self, f: &mut dyn FnMut(&mut BTreeMap<String, V>)) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load()?;
        f(&mut map);
        self.write(&map)
    }
}
