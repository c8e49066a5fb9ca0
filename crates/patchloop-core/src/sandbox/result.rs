use serde::{Deserialize, Serialize};

/// Outcome class of one sandboxed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Exited 0 within the time limit.
    Success,
    /// Exited non-zero or was killed by a signal.
    Error,
    /// Ran past the time limit and was killed.
    Timeout,
    /// Refused by the resource guard, nothing was spawned.
    Skipped,
    /// Could not be launched at all.
    Exception,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::Exception => "exception",
        }
    }

    /// Whether a failure of this kind is written to the ledger and offered
    /// for repair.
    pub fn is_repairable(self) -> bool {
        matches!(self, ExecutionStatus::Error | ExecutionStatus::Exception)
    }

    /// Whether a process actually ran (or was attempted) for this outcome.
    pub fn counts_as_attempt(self) -> bool {
        !matches!(self, ExecutionStatus::Skipped)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured outcome of one run. Built once by the executor, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration_seconds: f64,
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    pub(crate) fn skipped(reason: String) -> Self {
        Self {
            status: ExecutionStatus::Skipped,
            stdout: String::new(),
            stderr: reason,
            duration_seconds: 0.0,
            exit_code: None,
        }
    }

    pub(crate) fn exception(message: String, duration_seconds: f64) -> Self {
        Self {
            status: ExecutionStatus::Exception,
            stdout: String::new(),
            stderr: message,
            duration_seconds,
            exit_code: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Short description of the failure: the last non-empty stderr line.
    ///
    /// Interpreters print the exception type and message last, after the
    /// stack, so this is the line a human would quote.
    pub fn error_summary(&self) -> Option<&str> {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }

    /// Ledger message for a failed run: the last stderr line, else the exit
    /// code, else the status.
    pub fn failure_message(&self) -> String {
        match (self.error_summary(), self.exit_code) {
            (Some(line), _) => line.to_string(),
            (None, Some(code)) => format!("process exited with code {code}"),
            (None, None) => format!("process ended with status {}", self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> ExecutionResult {
        ExecutionResult {
            status: ExecutionStatus::Error,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration_seconds: 0.1,
            exit_code: Some(1),
        }
    }

    #[test]
    fn test_error_summary_takes_last_non_empty_line() {
        let r = failed(
            "Traceback (most recent call last):\n  File \"bad.py\", line 1\nZeroDivisionError: division by zero\n\n",
        );
        assert_eq!(
            r.error_summary(),
            Some("ZeroDivisionError: division by zero")
        );
    }

    #[test]
    fn test_error_summary_empty_stderr() {
        assert_eq!(failed("  \n").error_summary(), None);
    }

    #[test]
    fn test_failure_message_fallbacks() {
        let mut r = failed("Traceback\nValueError: bad\n");
        assert_eq!(r.failure_message(), "ValueError: bad");
        r.stderr.clear();
        assert_eq!(r.failure_message(), "process exited with code 1");
        r.exit_code = None;
        assert_eq!(r.failure_message(), "process ended with status error");
    }

    #[test]
    fn test_status_classes() {
        assert!(ExecutionStatus::Error.is_repairable());
        assert!(ExecutionStatus::Exception.is_repairable());
        assert!(!ExecutionStatus::Timeout.is_repairable());
        assert!(!ExecutionStatus::Skipped.is_repairable());
        assert!(ExecutionStatus::Timeout.counts_as_attempt());
        assert!(!ExecutionStatus::Skipped.counts_as_attempt());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ExecutionStatus::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
    }
}
