//! Error taxonomy for patchloop-core.
//!
//! Executor failures never appear here: they are folded into an
//! [`ExecutionResult`](crate::sandbox::ExecutionResult). What remains are the
//! conditions a caller can act on or must see.

use crate::directive::ParseError;

/// patchloop errors.
#[derive(Debug, thiserror::Error)]
pub enum PatchloopError {
    #[error("no recorded error for {0}")]
    LedgerMiss(String),

    #[error("storage error: {0}")]
    Storage(#[from] patchloop_state::StorageError),

    #[error("invalid directive: {0}")]
    Parse(#[from] ParseError),

    #[error("code generator failed: {0}")]
    Generator(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PatchloopError {
    /// `true` for the "nothing to repair" condition.
    pub fn is_ledger_miss(&self) -> bool {
        matches!(self, PatchloopError::LedgerMiss(_))
    }
}

/// Result type for patchloop operations.
pub type Result<T> = std::result::Result<T, PatchloopError>;
