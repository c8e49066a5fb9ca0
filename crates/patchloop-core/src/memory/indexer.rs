//! Structure extraction from source text.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Declared names of one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub classes: BTreeSet<String>,
    pub functions: BTreeSet<String>,
    /// Import statements in source order.
    pub imports: Vec<String>,
}

impl MemoryEntry {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.functions.is_empty() && self.imports.is_empty()
    }
}

/// Turns source text into a [`MemoryEntry`].
pub trait StructureIndexer: Send + Sync {
    fn extract(&self, source: &str) -> MemoryEntry;
}

/// Line-prefix indexer: `class X`, `def f`, `async def f`, `import ...`,
/// `from ... import ...`. No parsing, so it never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineIndexer;

impl StructureIndexer for LineIndexer {
    fn extract(&self, source: &str) -> MemoryEntry {
        let mut entry = MemoryEntry::default();
        for line in source.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("class ") {
                if let Some(name) = declared_name(rest) {
                    entry.classes.insert(name);
                }
            } else if let Some(rest) = line
                .strip_prefix("def ")
                .or_else(|| line.strip_prefix("async def "))
            {
                if let Some(name) = declared_name(rest) {
                    entry.functions.insert(name);
                }
            } else if line.starts_with("import ") || line.starts_with("from ") {
                entry.imports.push(line.to_string());
            }
        }
        entry
    }
}

fn declared_name(rest: &str) -> Option<String> {
    let name: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}
