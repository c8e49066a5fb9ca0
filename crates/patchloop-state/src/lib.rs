//! patchloop-state: keyed JSON persistence for patchloop
//!
//! Every durable map in the system (error ledger, run history, structure
//! index) is a `String -> V` map persisted as one JSON object per file.
//!
//! ## Key Components
//!
//! - `KeyedStore`: the read-modify-write contract shared by all backends
//! - `JsonFileStore`: file-backed store with atomic temp-file + rename writes
//! - `MemoryStore`: in-memory fake for tests

mod error;
pub mod fakes;
mod json_store;
pub mod storage_traits;

pub use error::StorageError;
pub use fakes::MemoryStore;
pub use json_store::JsonFileStore;
pub use storage_traits::{KeyedStore, StorageResult};
