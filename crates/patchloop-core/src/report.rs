//! Auditable session artifacts with digest verification.
//!
//! Layout: `<dir>/<session_id>/repair.json` plus `repair.digest` holding the
//! SHA-256 of the JSON bytes.

use std::path::{Path, PathBuf};

use crate::digest::ContentDigest;
use crate::error::{PatchloopError, Result};
use crate::orchestrator::RepairReport;

const REPORT_FILE: &str = "repair.json";
const DIGEST_FILE: &str = "repair.digest";

pub fn artifact_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(session_id).join(REPORT_FILE)
}

/// Write `<dir>/<session_id>/repair.json` and its digest.
pub fn write_report_artifact(report: &RepairReport, dir: &Path) -> Result<PathBuf> {
    let session_dir = dir.join(&report.session_id);
    std::fs::create_dir_all(&session_dir)?;

    let artifact_path = session_dir.join(REPORT_FILE);
    let digest_path = session_dir.join(DIGEST_FILE);
    let json = serde_json::to_vec_pretty(report)?;
    let digest = ContentDigest::from_bytes(&json);

    std::fs::write(&artifact_path, &json)?;
    std::fs::write(&digest_path, digest.as_str().as_bytes())?;

    tracing::debug!(path = %artifact_path.display(), digest = digest.short(), "report written");
    Ok(artifact_path)
}

/// Read and verify `<dir>/<session_id>/repair.json`.
pub fn read_report_artifact(session_id: &str, dir: &Path) -> Result<RepairReport> {
    let session_dir = dir.join(session_id);
    let json = std::fs::read(session_dir.join(REPORT_FILE))?;
    let expected = std::fs::read_to_string(session_dir.join(DIGEST_FILE))?;
    let actual = ContentDigest::from_bytes(&json);
    if expected.trim() != actual.as_str() {
        return Err(PatchloopError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

/// Session ids under `dir`, oldest first by modification time.
pub fn list_sessions(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut sessions = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.path().join(REPORT_FILE).is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        sessions.push((modified, entry.file_name().to_string_lossy().into_owned()));
    }
    sessions.sort();
    Ok(sessions.into_iter().map(|(_, id)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_key::FileKey;
    use crate::orchestrator::StopReason;
    use crate::sandbox::{ExecutionResult, ExecutionStatus};
    use chrono::Utc;

    fn report(session_id: &str) -> RepairReport {
        RepairReport {
            session_id: session_id.to_string(),
            filepath: FileKey::new("bad.py"),
            outcome: StopReason::Denied,
            status: ExecutionStatus::Error,
            attempts: 1,
            session_attempts: 1,
            last_fixed: false,
            message: "repair declined".to_string(),
            final_result: ExecutionResult {
                status: ExecutionStatus::Error,
                stdout: String::new(),
                stderr: "ZeroDivisionError: division by zero".to_string(),
                duration_seconds: 0.05,
                exit_code: Some(1),
            },
            transitions: Vec::new(),
            repairs: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_then_read_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report_artifact(&report("s1"), dir.path()).unwrap();
        assert_eq!(path, artifact_path(dir.path(), "s1"));
        let back = read_report_artifact("s1", dir.path()).unwrap();
        assert_eq!(back.outcome, StopReason::Denied);
        assert_eq!(list_sessions(dir.path()).unwrap(), vec!["s1".to_string()]);
    }

    #[test]
    fn test_tampered_report_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report_artifact(&report("s2"), dir.path()).unwrap();
        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("repair declined", "all good");
        std::fs::write(&path, tampered).unwrap();
        let err = read_report_artifact("s2", dir.path()).unwrap_err();
        assert!(matches!(err, PatchloopError::DigestMismatch { .. }));
    }

    #[test]
    fn test_list_sessions_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_sessions(&dir.path().join("none")).unwrap().is_empty());
    }
}
