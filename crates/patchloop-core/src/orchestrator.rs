//! Repair orchestrator: guard, run, record, confirm, repair, retry.
//!
//! One call to [`RepairOrchestrator::run`] drives a single file through
//!
//! ```text
//! Idle -> Running -> Succeeded -> Idle
//!                 -> Failed -> ConfirmPending -> Repairing -> Running
//!                           -> Idle
//! ```
//!
//! bounded by [`RepairPolicy::max_attempts`] per session. The bound fails
//! closed: once reached, no confirmation is asked and nothing is rewritten.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::config::RepairPolicy;
use crate::confirm::{ConfirmationGate, FixRequest};
use crate::digest::ContentDigest;
use crate::error::Result;
use crate::file_key::FileKey;
use crate::history::{AttemptState, RunHistory};
use crate::ledger::{ErrorLedger, ErrorRecord};
use crate::obs;
use crate::report;
use crate::sandbox::{ExecutionResult, ExecutionStatus, SandboxedExecutor};
use crate::writer::{CodeWriter, WriteOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    Idle,
    Running,
    Succeeded,
    Failed,
    ConfirmPending,
    Repairing,
}

impl RepairState {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairState::Idle => "idle",
            RepairState::Running => "running",
            RepairState::Succeeded => "succeeded",
            RepairState::Failed => "failed",
            RepairState::ConfirmPending => "confirm_pending",
            RepairState::Repairing => "repairing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: RepairState,
    pub to: RepairState,
    /// Persisted attempt count at the time of the transition.
    pub attempts: u32,
    pub at: DateTime<Utc>,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Succeeded,
    Denied,
    AttemptsExhausted,
    TimedOut,
    Skipped,
    RepairFailed,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Succeeded => "succeeded",
            StopReason::Denied => "denied",
            StopReason::AttemptsExhausted => "attempts_exhausted",
            StopReason::TimedOut => "timed_out",
            StopReason::Skipped => "skipped",
            StopReason::RepairFailed => "repair_failed",
        }
    }
}

/// One applied repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRepair {
    /// Attempt whose failure this repair answers.
    pub after_attempt: u32,
    pub source_digest: ContentDigest,
    pub bytes: usize,
}

/// Everything a caller needs to know about one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub session_id: String,
    pub filepath: FileKey,
    pub outcome: StopReason,
    pub status: ExecutionStatus,
    /// Persisted attempt count, across sessions.
    pub attempts: u32,
    /// Attempts made in this session alone.
    pub session_attempts: u32,
    pub last_fixed: bool,
    pub message: String,
    pub final_result: ExecutionResult,
    pub transitions: Vec<Transition>,
    pub repairs: Vec<AppliedRepair>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RepairReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == StopReason::Succeeded
    }
}

/// Result of a one-shot repair from the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum FixOutcome {
    NothingToFix,
    Denied,
    Repaired(WriteOutcome),
}

/// Tracks the current state and the transition log of one session.
struct StateTrack<'a> {
    filepath: &'a FileKey,
    state: RepairState,
    transitions: Vec<Transition>,
}

impl<'a> StateTrack<'a> {
    fn new(filepath: &'a FileKey) -> Self {
        Self {
            filepath,
            state: RepairState::Idle,
            transitions: Vec::new(),
        }
    }

    fn to(&mut self, next: RepairState, attempts: u32) {
        obs::emit_transition(self.filepath, self.state, next, attempts);
        self.transitions.push(Transition {
            from: self.state,
            to: next,
            attempts,
            at: Utc::now(),
        });
        self.state = next;
    }
}

#[derive(Clone)]
pub struct RepairOrchestrator {
    executor: SandboxedExecutor,
    ledger: ErrorLedger,
    history: RunHistory,
    writer: CodeWriter,
    gate: Arc<dyn ConfirmationGate>,
    policy: RepairPolicy,
    sessions_dir: Option<PathBuf>,
}

impl RepairOrchestrator {
    pub fn new(
        executor: SandboxedExecutor,
        ledger: ErrorLedger,
        history: RunHistory,
        writer: CodeWriter,
        gate: Arc<dyn ConfirmationGate>,
        policy: RepairPolicy,
    ) -> Self {
        Self {
            executor,
            ledger,
            history,
            writer,
            gate,
            policy,
            sessions_dir: None,
        }
    }

    /// Persist every report under `dir/<session_id>/`.
    pub fn with_sessions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sessions_dir = Some(dir.into());
        self
    }

    pub fn ledger(&self) -> &ErrorLedger {
        &self.ledger
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn executor(&self) -> &SandboxedExecutor {
        &self.executor
    }

    pub fn writer(&self) -> &CodeWriter {
        &self.writer
    }

    /// Drive `filepath` to a terminal state.
    ///
    /// Store failures propagate. Generator failures end the loop with
    /// [`StopReason::RepairFailed`].
    pub async fn run(&self, filepath: &Path) -> Result<RepairReport> {
        let session_id = Uuid::new_v4().to_string();
        let key = FileKey::new(filepath);
        let span = obs::session_span(&session_id, &key);
        self.run_session(session_id, key, filepath)
            .instrument(span)
            .await
    }

    async fn run_session(
        &self,
        session_id: String,
        key: FileKey,
        filepath: &Path,
    ) -> Result<RepairReport> {
        let started_at = Utc::now();

        let mut track = StateTrack::new(&key);
        let mut attempts = self.history.get(filepath)?.map_or(0, |s| s.attempts);
        let mut session_attempts: u32 = 0;
        let mut after_repair = false;
        let mut repairs: Vec<AppliedRepair> = Vec::new();

        let (outcome, message, result) = loop {
            track.to(RepairState::Running, attempts);
            let result = self.executor.run_file_safe(filepath).await;
            if result.status.counts_as_attempt() {
                attempts += 1;
                session_attempts += 1;
            }

            match result.status {
                ExecutionStatus::Success => {
                    track.to(RepairState::Succeeded, attempts);
                    self.save_state(&key, attempts, &result, after_repair)?;
                    let message = if after_repair {
                        format!("{key} runs cleanly after {} repair(s)", repairs.len())
                    } else {
                        format!("{key} ran successfully")
                    };
                    break (StopReason::Succeeded, message, result);
                }
                ExecutionStatus::Timeout | ExecutionStatus::Skipped => {
                    track.to(RepairState::Failed, attempts);
                    self.save_state(&key, attempts, &result, false)?;
                    let (reason, message) = if result.status == ExecutionStatus::Timeout {
                        (
                            StopReason::TimedOut,
                            format!(
                                "{key} timed out after {}s, not repairable",
                                result.duration_seconds
                            ),
                        )
                    } else {
                        (StopReason::Skipped, format!("{key} not run: {}", result.stderr))
                    };
                    break (reason, message, result);
                }
                ExecutionStatus::Error | ExecutionStatus::Exception => {
                    track.to(RepairState::Failed, attempts);
                    let record = self.ledger.record(
                        filepath,
                        result.failure_message(),
                        result.stderr.clone(),
                    )?;
                    self.save_state(&key, attempts, &result, false)?;

                    if session_attempts >= self.policy.max_attempts {
                        let message = format!(
                            "{key} still failing after {session_attempts} attempt(s): {}",
                            record.error_message
                        );
                        break (StopReason::AttemptsExhausted, message, result);
                    }

                    track.to(RepairState::ConfirmPending, attempts);
                    let request = FixRequest {
                        filepath: key.clone(),
                        attempt: session_attempts,
                        max_attempts: self.policy.max_attempts,
                        record: record.clone(),
                    };
                    if !self.gate.confirm(&request).await.is_approved() {
                        let message = format!("repair declined: {}", record.error_message);
                        break (StopReason::Denied, message, result);
                    }

                    track.to(RepairState::Repairing, attempts);
                    match self
                        .writer
                        .repair_file(filepath, &record, &self.policy.fix_instruction)
                        .await
                    {
                        Ok(written) => {
                            obs::emit_repair_applied(&key, attempts, written.bytes);
                            repairs.push(AppliedRepair {
                                after_attempt: attempts,
                                source_digest: written.source_digest,
                                bytes: written.bytes,
                            });
                            after_repair = true;
                        }
                        Err(e) => {
                            warn!(filepath = %key, error = %e, "repair failed");
                            let message = format!("repair failed: {e}");
                            break (StopReason::RepairFailed, message, result);
                        }
                    }
                }
            }
        };

        track.to(RepairState::Idle, attempts);
        let report = RepairReport {
            session_id,
            filepath: key.clone(),
            outcome,
            status: result.status,
            attempts,
            session_attempts,
            last_fixed: outcome == StopReason::Succeeded && after_repair,
            message,
            final_result: result,
            transitions: track.transitions,
            repairs,
            started_at,
            finished_at: Utc::now(),
        };

        if let Some(dir) = &self.sessions_dir {
            if let Err(e) = report::write_report_artifact(&report, dir) {
                obs::emit_persist_error(&key, &e);
            }
        }
        Ok(report)
    }

    /// Repair `filepath` once from its ledger record, without running it.
    pub async fn fix_from_ledger(&self, filepath: &Path) -> Result<FixOutcome> {
        let record: ErrorRecord = match self.ledger.latest(filepath) {
            Ok(record) => record,
            Err(e) if e.is_ledger_miss() => return Ok(FixOutcome::NothingToFix),
            Err(e) => return Err(e),
        };
        let attempts = self.history.get(filepath)?.map_or(0, |s| s.attempts);
        let request = FixRequest {
            filepath: record.filepath.clone(),
            attempt: attempts,
            max_attempts: self.policy.max_attempts,
            record: record.clone(),
        };
        if !self.gate.confirm(&request).await.is_approved() {
            return Ok(FixOutcome::Denied);
        }
        let written = self
            .writer
            .repair_file(filepath, &record, &self.policy.fix_instruction)
            .await?;
        obs::emit_repair_applied(&record.filepath, attempts, written.bytes);
        Ok(FixOutcome::Repaired(written))
    }

    fn save_state(
        &self,
        key: &FileKey,
        attempts: u32,
        result: &ExecutionResult,
        last_fixed: bool,
    ) -> Result<AttemptState> {
        self.history.record(AttemptState {
            filepath: key.clone(),
            attempts,
            status: result.status,
            last_fixed,
            output: result.stdout.clone(),
            updated_at: Utc::now(),
        })
    }
}
