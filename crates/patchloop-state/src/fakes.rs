//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryStore` satisfies the `KeyedStore` contract without touching disk.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::storage_traits::{KeyedStore, StorageResult};

/// In-memory keyed store backed by a `BTreeMap<String, V>`.
#[derive(Debug)]
pub struct MemoryStore<V> {
    map: Mutex<BTreeMap<String, V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyedStore<V> for MemoryStore<V>
where
    V: Clone + Send,
{
    fn entries(&self) -> StorageResult<BTreeMap<String, V>> {
        let map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.clone())
    }

    fn modify(&self, f: &mut dyn FnMut(&mut BTreeMap<String, V>)) -> StorageResult<()> {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut map);
        Ok(())
    }
}
