//! Scripted generator for tests and dry runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{CodeGenerator, GenerationRequest};
use crate::error::{PatchloopError, Result};

/// Replays queued responses in order and records every request it sees.
///
/// An empty queue answers with a `Generator` error.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gen = Self::new();
        for r in responses {
            gen.push_ok(r);
        }
        gen
    }

    pub fn push_ok(&self, code: impl Into<String>) {
        self.lock_responses().push_back(Ok(code.into()));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.lock_responses().push_back(Err(message.into()));
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<std::result::Result<String, String>>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        match self.lock_responses().pop_front() {
            Some(Ok(code)) => Ok(code),
            Some(Err(message)) => Err(PatchloopError::Generator(message)),
            None => Err(PatchloopError::Generator(
                "no scripted response left".to_string(),
            )),
        }
    }
}
