//! Storage trait definitions for patchloop
//!
//! A single abstraction covers every persisted map in the system: the
//! error ledger, the run history and the structure index are all
//! `key -> value` maps that are read whole, modified, and written whole.
//!
//! In-memory fakes are provided for testing via the `fakes` module.

use std::collections::BTreeMap;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Keyed map store.
///
/// Guarantees:
/// - `modify` is a read-modify-write cycle that is serialized against every
///   other `modify` on the same store instance (no lost updates).
/// - A failed write leaves the previously persisted map intact.
/// - `entries` always observes a complete map, never a torn write.
pub trait KeyedStore<V>: Send + Sync {
    /// Load the full map.
    fn entries(&self) -> StorageResult<BTreeMap<String, V>>;

    /// Load the full map, apply `f`, and persist the result.
    fn modify(&self, f: &mut dyn FnMut(&mut BTreeMap<String, V>)) -> StorageResult<()>;

    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<V>> {
        Ok(self.entries()?.remove(key))
    }

    /// Insert or overwrite `key`. Returns the previous value.
    fn put(&self, key: &str, value: V) -> StorageResult<Option<V>> {
        let mut value = Some(value);
        let mut previous = None;
        self.modify(&mut |map: &mut BTreeMap<String, V>| {
            if let Some(v) = value.take() {
                previous = map.insert(key.to_string(), v);
            }
        })?;
        Ok(previous)
    }

    /// Remove `key`. Returns the removed value, `None` if it was absent.
    fn remove(&self, key: &str) -> StorageResult<Option<V>> {
        let mut removed = None;
        self.modify(&mut |map: &mut BTreeMap<String, V>| {
            removed = map.remove(key);
        })?;
        Ok(removed)
    }

    /// Replace the whole map.
    fn replace_all(&self, entries: BTreeMap<String, V>) -> StorageResult<()> {
        let mut entries = Some(entries);
        self.modify(&mut |map: &mut BTreeMap<String, V>| {
            if let Some(e) = entries.take() {
                *map = e;
            }
        })
    }
}
