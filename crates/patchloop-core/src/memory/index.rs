//! Persistent structure index keyed by normalized path.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use patchloop_state::{JsonFileStore, KeyedStore, MemoryStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use super::indexer::{LineIndexer, MemoryEntry, StructureIndexer};
use crate::error::Result;
use crate::file_key::FileKey;

/// Everything the index knows, handed to the generator as context.
pub type MemorySnapshot = BTreeMap<FileKey, MemoryEntry>;

/// Directory names never descended into by [`MemoryIndex::scan_directory`].
const IGNORED_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "__pycache__",
    "build",
    "dist",
    "venv",
];

/// Extensions treated as source files when scanning.
const SOURCE_EXTENSIONS: &[&str] = &["py", "js", "ts", "rb", "sh", "dart"];

/// Result of a directory scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub indexed: usize,
    pub unreadable: usize,
    pub removed: usize,
}

#[derive(Clone)]
pub struct MemoryIndex {
    store: Arc<dyn KeyedStore<MemoryEntry>>,
    indexer: Arc<dyn StructureIndexer>,
}

impl MemoryIndex {
    pub fn new(
        store: Arc<dyn KeyedStore<MemoryEntry>>,
        indexer: Arc<dyn StructureIndexer>,
    ) -> Self {
        Self { store, indexer }
    }

    /// Index backed by a JSON file at `path`, using [`LineIndexer`].
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(JsonFileStore::open(path)), Arc::new(LineIndexer))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(LineIndexer))
    }

    /// Re-index `filepath` from `source` and store the entry.
    pub fn update(&self, filepath: impl AsRef<Path>, source: &str) -> Result<MemoryEntry> {
        let key = FileKey::new(filepath);
        let entry = self.indexer.extract(source);
        self.store.put(key.as_str(), entry.clone())?;
        debug!(
            filepath = %key,
            classes = entry.classes.len(),
            functions = entry.functions.len(),
            "structure indexed"
        );
        Ok(entry)
    }

    pub fn get(&self, filepath: impl AsRef<Path>) -> Result<Option<MemoryEntry>> {
        let key = FileKey::new(filepath);
        Ok(self.store.get(key.as_str())?)
    }

    pub fn snapshot(&self) -> Result<MemorySnapshot> {
        Ok(self
            .store
            .entries()?
            .into_iter()
            .map(|(k, v)| (FileKey::new(k), v))
            .collect())
    }

    pub fn remove(&self, filepath: impl AsRef<Path>) -> Result<Option<MemoryEntry>> {
        let key = FileKey::new(filepath);
        Ok(self.store.remove(key.as_str())?)
    }

    /// Move the entry for `from` to `to`. Returns `false` if `from` had none.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<bool> {
        let from = FileKey::new(from);
        let to = FileKey::new(to);
        let mut moved = false;
        self.store
            .modify(&mut |map: &mut BTreeMap<String, MemoryEntry>| {
                if let Some(entry) = map.remove(from.as_str()) {
                    map.insert(to.as_str().to_string(), entry);
                    moved = true;
                }
            })?;
        Ok(moved)
    }

    /// Rebuild the entries for every source file under `root`.
    ///
    /// Hidden directories and common build/vendor directories are skipped.
    /// Entries under `root` whose file no longer exists are dropped; entries
    /// elsewhere are left alone.
    pub fn scan_directory(&self, root: impl AsRef<Path>) -> Result<ScanSummary> {
        let root = root.as_ref();
        let root_key = FileKey::new(root);
        let mut summary = ScanSummary::default();
        let mut fresh: BTreeMap<String, MemoryEntry> = BTreeMap::new();

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_ignored(e))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_source_file(path) {
                continue;
            }
            match std::fs::read_to_string(path) {
                Ok(source) => {
                    let key = FileKey::new(path);
                    fresh.insert(key.as_str().to_string(), self.indexer.extract(&source));
                    summary.indexed += 1;
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    summary.unreadable += 1;
                }
            }
        }

        let mut fresh = Some(fresh);
        let mut removed = 0;
        self.store
            .modify(&mut |map: &mut BTreeMap<String, MemoryEntry>| {
                if let Some(fresh) = fresh.take() {
                    let before = map.len();
                    map.retain(|key, _| !is_under(key, &root_key) || fresh.contains_key(key));
                    removed = before - map.len();
                    map.extend(fresh);
                }
            })?;
        summary.removed = removed;

        info!(
            root = %root_key,
            indexed = summary.indexed,
            removed = summary.removed,
            unreadable = summary.unreadable,
            "structure index rebuilt"
        );
        Ok(summary)
    }
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| {
            name.starts_with('.') || (entry.file_type().is_dir() && IGNORED_DIRS.contains(&name))
        })
        .unwrap_or(false)
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_under(key: &str, root: &FileKey) -> bool {
    match root.as_str() {
        "." => !key.starts_with('/') && !key.starts_with("../") && key != "..",
        "/" => key.starts_with('/'),
        root => key == root || key.starts_with(&format!("{root}/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_and_snapshot() {
        let index = MemoryIndex::in_memory();
        index
            .update("./pkg/mod.py", "class A:\n    def run(self): pass\n")
            .unwrap();
        let snap = index.snapshot().unwrap();
        let entry = &snap[&FileKey::new("pkg/mod.py")];
        assert!(entry.classes.contains("A"));
        assert!(entry.functions.contains("run"));
    }

    #[test]
    fn test_rename_moves_entry() {
        let index = MemoryIndex::in_memory();
        index.update("old.py", "def f(): pass\n").unwrap();
        assert!(index.rename("old.py", "new/./f.py").unwrap());
        assert!(index.get("old.py").unwrap().is_none());
        assert!(index.get("new/f.py").unwrap().is_some());
        assert!(!index.rename("old.py", "x.py").unwrap());
    }

    #[test]
    fn test_is_under() {
        let root = FileKey::new("gen");
        assert!(is_under("gen/a.py", &root));
        assert!(is_under("gen", &root));
        assert!(!is_under("general/a.py", &root));
        let cwd = FileKey::new(".");
        assert!(is_under("a.py", &cwd));
        assert!(!is_under("../a.py", &cwd));
        assert!(!is_under("/tmp/a.py", &cwd));
    }
}
