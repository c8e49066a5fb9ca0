//! Post-write linting, dispatched on file extension.
//!
//! Lint results are advisory. A missing tool or a failing check is reported
//! in the [`LintReport`] and never fails the write that triggered it.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LintStatus {
    /// Every step exited 0.
    Clean,
    /// At least one step reported problems.
    Findings,
    /// A tool was missing or did not finish.
    Unavailable,
    /// No linter applies to this file.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    pub linter: String,
    pub status: LintStatus,
    pub output: String,
}

#[async_trait]
pub trait Linter: Send + Sync {
    fn name(&self) -> &str;
    async fn lint(&self, path: &Path) -> LintReport;
}

/// Runs a fixed sequence of external commands. `{file}` in an argument is
/// replaced by the target path.
pub struct CommandLinter {
    name: String,
    steps: Vec<Vec<String>>,
    timeout: Duration,
}

impl CommandLinter {
    pub fn new(name: impl Into<String>, steps: Vec<Vec<String>>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            steps,
            timeout,
        }
    }

    async fn run_step(&self, argv: &[String], path: &Path) -> (LintStatus, String) {
        let Some((program, args)) = argv.split_first() else {
            return (LintStatus::Clean, String::new());
        };
        let file = path.to_string_lossy();
        let args: Vec<String> = args.iter().map(|a| a.replace("{file}", &file)).collect();

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(self.timeout, output).await {
            Err(_) => (
                LintStatus::Unavailable,
                format!("{program} timed out after {}s\n", self.timeout.as_secs()),
            ),
            Ok(Err(e)) => (LintStatus::Unavailable, format!("{program}: {e}\n")),
            Ok(Ok(out)) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                let status = if out.status.success() {
                    LintStatus::Clean
                } else {
                    LintStatus::Findings
                };
                (status, text)
            }
        }
    }
}

#[async_trait]
impl Linter for CommandLinter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lint(&self, path: &Path) -> LintReport {
        let mut status = LintStatus::Clean;
        let mut output = String::new();
        for step in &self.steps {
            let (step_status, text) = self.run_step(step, path).await;
            output.push_str(&text);
            status = worse(status, step_status);
        }
        LintReport {
            linter: self.name.clone(),
            status,
            output,
        }
    }
}

fn worse(a: LintStatus, b: LintStatus) -> LintStatus {
    fn rank(s: LintStatus) -> u8 {
        match s {
            LintStatus::Skipped => 0,
            LintStatus::Clean => 1,
            LintStatus::Findings => 2,
            LintStatus::Unavailable => 3,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

/// Fallback for extensions without a linter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLinter;

#[async_trait]
impl Linter for NoOpLinter {
    fn name(&self) -> &str {
        "none"
    }

    async fn lint(&self, path: &Path) -> LintReport {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| "files without extension".to_string());
        LintReport {
            linter: self.name().to_string(),
            status: LintStatus::Skipped,
            output: format!("no linter configured for {ext}"),
        }
    }
}

/// Extension to linter lookup table.
#[derive(Clone)]
pub struct LinterRegistry {
    by_extension: BTreeMap<String, Arc<dyn Linter>>,
    fallback: Arc<dyn Linter>,
}

impl LinterRegistry {
    /// Registry with no linters; everything is skipped.
    pub fn empty() -> Self {
        Self {
            by_extension: BTreeMap::new(),
            fallback: Arc::new(NoOpLinter),
        }
    }

    /// pylint + autopep8 for Python, eslint for JS/TS, `dart analyze` for Dart.
    pub fn standard(timeout: Duration) -> Self {
        let argv = |parts: &[&str]| parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        let python: Arc<dyn Linter> = Arc::new(CommandLinter::new(
            "pylint+autopep8",
            vec![
                argv(&["pylint", "{file}"]),
                argv(&["autopep8", "--in-place", "--aggressive", "{file}"]),
            ],
            timeout,
        ));
        let eslint: Arc<dyn Linter> = Arc::new(CommandLinter::new(
            "eslint",
            vec![argv(&["eslint", "{file}", "--fix"])],
            timeout,
        ));
        let dart: Arc<dyn Linter> = Arc::new(CommandLinter::new(
            "dart-analyze",
            vec![argv(&["dart", "analyze", "{file}"])],
            timeout,
        ));

        Self::empty()
            .with("py", python)
            .with("js", Arc::clone(&eslint))
            .with("ts", eslint)
            .with("dart", dart)
    }

    pub fn with(mut self, extension: &str, linter: Arc<dyn Linter>) -> Self {
        self.by_extension
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), linter);
        self
    }

    pub fn for_path(&self, path: &Path) -> Arc<dyn Linter> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.by_extension.get(&e.to_ascii_lowercase()))
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub async fn lint(&self, path: &Path) -> LintReport {
        let report = self.for_path(path).lint(path).await;
        match report.status {
            LintStatus::Unavailable => warn!(
                path = %path.display(),
                linter = %report.linter,
                "linter unavailable"
            ),
            status => debug!(path = %path.display(), linter = %report.linter, ?status, "lint finished"),
        }
        report
    }
}

impl Default for LinterRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_unknown_extension_is_skipped() {
        let registry = LinterRegistry::standard(Duration::from_secs(5));
        let report = registry.lint(Path::new("notes.txt")).await;
        assert_eq!(report.status, LintStatus::Skipped);
        assert!(report.output.contains(".txt"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_unavailable() {
        let linter = CommandLinter::new(
            "ghost",
            vec![vec!["patchloop-no-such-linter".to_string(), "{file}".to_string()]],
            Duration::from_secs(5),
        );
        let report = linter.lint(Path::new("a.py")).await;
        assert_eq!(report.status, LintStatus::Unavailable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_placeholder_and_worst_status_wins() {
        let linter = CommandLinter::new(
            "fake",
            vec![sh("echo checked {file}"), sh("echo bad >&2; exit 3")],
            Duration::from_secs(5),
        );
        let report = linter.lint(Path::new("x.py")).await;
        assert_eq!(report.status, LintStatus::Findings);
        assert!(report.output.contains("checked x.py"));
        assert!(report.output.contains("bad"));
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = LinterRegistry::standard(Duration::from_secs(1));
        assert_eq!(registry.for_path(Path::new("a.PY")).name(), "pylint+autopep8");
        assert_eq!(registry.for_path(Path::new("a.ts")).name(), "eslint");
        assert_eq!(registry.for_path(Path::new("a.rs")).name(), "none");
    }
}
