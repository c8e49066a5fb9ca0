//! Structure memory: which classes, functions and imports each file declares.
//!
//! The snapshot is passed to the code generator as context so new code can
//! reuse what already exists.

pub mod index;
pub mod indexer;

pub use index::{MemoryIndex, MemorySnapshot, ScanSummary};
pub use indexer::{LineIndexer, MemoryEntry, StructureIndexer};
