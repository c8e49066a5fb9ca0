//! Structured observability hooks for guard, execution and repair events.
//!
//! This module provides:
//! - Session-scoped tracing spans via `session_span`
//! - Emission functions for key events: guard verdicts, executions, state
//!   transitions, applied repairs
//!
//! Severity follows the outcome: info for success, warn for skipped and
//! timed-out runs, error for crashes and launch failures.

use tracing::{error, info, warn};

use crate::file_key::FileKey;
use crate::guard::GuardVerdict;
use crate::orchestrator::RepairState;
use crate::sandbox::{ExecutionResult, ExecutionStatus};

/// Span for one repair session. Attach it with `Instrument` so it follows
/// the future across await points.
///
/// # Example
///
/// ```ignore
/// run_loop(path).instrument(session_span(&id, &key)).await
/// // every event inside carries session_id and filepath
/// ```
pub fn session_span(session_id: &str, filepath: &FileKey) -> tracing::Span {
    tracing::info_span!(
        "patchloop.session",
        session_id = %session_id,
        filepath = %filepath,
    )
}

/// Emit event: guard verdict with the full snapshot.
pub fn emit_guard_verdict(verdict: &GuardVerdict) {
    let snap = &verdict.snapshot;
    if verdict.safe {
        info!(
            event = "guard.verdict",
            safe = true,
            cpu_percent = snap.cpu_percent,
            ram_percent = snap.ram_percent,
            accelerator_percent = snap.accelerator_percent,
        );
    } else {
        warn!(
            event = "guard.verdict",
            safe = false,
            cpu_percent = snap.cpu_percent,
            ram_percent = snap.ram_percent,
            accelerator_percent = snap.accelerator_percent,
            exceeded = %verdict.reason(),
        );
    }
}

/// Emit event: one sandboxed run finished.
pub fn emit_execution(filepath: &FileKey, result: &ExecutionResult) {
    let duration_seconds = result.duration_seconds;
    let summary = result.error_summary().unwrap_or("");
    match result.status {
        ExecutionStatus::Success => info!(
            event = "execution.finished",
            filepath = %filepath,
            status = "success",
            duration_seconds,
        ),
        ExecutionStatus::Skipped => warn!(
            event = "execution.skipped",
            filepath = %filepath,
            reason = %result.stderr,
        ),
        ExecutionStatus::Timeout => warn!(
            event = "execution.timeout",
            filepath = %filepath,
            duration_seconds,
        ),
        ExecutionStatus::Error => error!(
            event = "execution.crashed",
            filepath = %filepath,
            exit_code = ?result.exit_code,
            duration_seconds,
            error = %summary,
        ),
        ExecutionStatus::Exception => error!(
            event = "execution.exception",
            filepath = %filepath,
            error = %summary,
        ),
    }
}

/// Emit event: repair state machine transition.
pub fn emit_transition(filepath: &FileKey, from: RepairState, to: RepairState, attempts: u32) {
    info!(
        event = "repair.transition",
        filepath = %filepath,
        from = from.as_str(),
        to = to.as_str(),
        attempts,
    );
}

/// Emit event: generator output written over the target file.
pub fn emit_repair_applied(filepath: &FileKey, attempt: u32, bytes: usize) {
    info!(event = "repair.applied", filepath = %filepath, attempt, bytes);
}

/// Emit event: a session artifact could not be written (warning level).
pub fn emit_persist_error(filepath: &FileKey, error: &dyn std::fmt::Display) {
    warn!(event = "repair.persist_error", filepath = %filepath, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::ResourceSnapshot;

    #[test]
    fn test_session_span_create() {
        let _entered = session_span("session-1", &FileKey::new("a.py")).entered();
    }

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let key = FileKey::new("a.py");
        emit_guard_verdict(&GuardVerdict {
            snapshot: ResourceSnapshot::new(1.0, 2.0, 0.0),
            safe: true,
            exceeded: Vec::new(),
        });
        emit_execution(
            &key,
            &ExecutionResult {
                status: ExecutionStatus::Error,
                stdout: String::new(),
                stderr: "boom\n".to_string(),
                duration_seconds: 0.2,
                exit_code: Some(1),
            },
        );
        emit_transition(&key, RepairState::Idle, RepairState::Running, 0);
        emit_repair_applied(&key, 1, 42);
    }
}
