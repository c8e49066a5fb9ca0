//! Human confirmation before a repair overwrites a file.
//!
//! A repair runs only on an explicit [`ConfirmDecision::Approve`]. Gates that
//! cannot reach a human must deny.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::file_key::FileKey;
use crate::ledger::ErrorRecord;

/// What the gate is being asked to allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRequest {
    pub filepath: FileKey,
    /// Attempts made so far in this session.
    pub attempt: u32,
    pub max_attempts: u32,
    pub record: ErrorRecord,
}

impl FixRequest {
    /// One-line description for prompts and logs.
    pub fn summary(&self) -> String {
        format!(
            "{} failed (attempt {}/{}): {}",
            self.filepath, self.attempt, self.max_attempts, self.record.error_message
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmDecision {
    Approve,
    Deny,
}

impl ConfirmDecision {
    pub fn is_approved(self) -> bool {
        self == ConfirmDecision::Approve
    }
}

#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, request: &FixRequest) -> ConfirmDecision;
}

/// Approves every repair.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ConfirmationGate for AutoApprove {
    async fn confirm(&self, _request: &FixRequest) -> ConfirmDecision {
        ConfirmDecision::Approve
    }
}

/// Denies every repair.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDeny;

#[async_trait]
impl ConfirmationGate for AutoDeny {
    async fn confirm(&self, _request: &FixRequest) -> ConfirmDecision {
        ConfirmDecision::Deny
    }
}

/// Answers from a fixed script, then denies. Records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedGate {
    decisions: Mutex<VecDeque<ConfirmDecision>>,
    asked: Mutex<Vec<FixRequest>>,
}

impl ScriptedGate {
    pub fn new(decisions: impl IntoIterator<Item = ConfirmDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<FixRequest> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ConfirmationGate for ScriptedGate {
    async fn confirm(&self, request: &FixRequest) -> ConfirmDecision {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(ConfirmDecision::Deny)
    }
}
