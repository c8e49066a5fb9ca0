//! Code generation collaborators.
//!
//! The generator output is untrusted text. It is written to disk as-is and
//! judged only by running it.

pub mod ollama;
pub mod prompt;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::MemorySnapshot;

pub use ollama::OllamaGenerator;
pub use scripted::ScriptedGenerator;

/// One generation call: what to do, plus what the codebase already has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub instruction: String,
    pub context: MemorySnapshot,
}

impl GenerationRequest {
    pub fn new(instruction: impl Into<String>, context: MemorySnapshot) -> Self {
        Self {
            instruction: instruction.into(),
            context,
        }
    }
}

/// Prompt in, source text out.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
