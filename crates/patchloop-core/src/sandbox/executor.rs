use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use super::interpreter::InterpreterTable;
use super::result::{ExecutionResult, ExecutionStatus};
use crate::config::SandboxConfig;
use crate::file_key::FileKey;
use crate::guard::ResourceGuard;
use crate::obs;

const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Runs one file as a child process under a wall-clock limit.
///
/// Every failure mode is folded into the returned [`ExecutionResult`]; this
/// type has no error path.
#[derive(Clone)]
pub struct SandboxedExecutor {
    config: SandboxConfig,
    guard: ResourceGuard,
    interpreters: InterpreterTable,
}

impl SandboxedExecutor {
    pub fn new(config: SandboxConfig, guard: ResourceGuard) -> Self {
        let interpreters = InterpreterTable::with_overrides(&config.interpreters);
        Self {
            config,
            guard,
            interpreters,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn guard(&self) -> &ResourceGuard {
        &self.guard
    }

    /// Run `filepath`, consulting the guard first when safe mode is on.
    pub async fn run_file_safe(&self, filepath: &Path) -> ExecutionResult {
        let key = FileKey::new(filepath);

        if self.config.safe_mode_enabled {
            let verdict = self.guard.check().await;
            if !verdict.safe {
                let result = ExecutionResult::skipped(format!(
                    "execution skipped, resource limits exceeded: {}",
                    verdict.reason()
                ));
                obs::emit_execution(&key, &result);
                return result;
            }
        }

        let result = self.spawn_and_wait(filepath).await;
        obs::emit_execution(&key, &result);
        result
    }

    async fn spawn_and_wait(&self, filepath: &Path) -> ExecutionResult {
        let started = Instant::now();

        if !filepath.is_file() {
            return ExecutionResult::exception(
                format!("file not found: {}", filepath.display()),
                0.0,
            );
        }

        let target = match self.resolve_target(filepath) {
            Ok(target) => target,
            Err(e) => {
                return ExecutionResult::exception(
                    format!("cannot resolve {}: {e}", filepath.display()),
                    0.0,
                )
            }
        };
        let timeout = match Duration::try_from_secs_f64(self.config.timeout_seconds) {
            Ok(timeout) => timeout,
            Err(e) => {
                return ExecutionResult::exception(
                    format!(
                        "invalid timeout {}s: {e}",
                        self.config.timeout_seconds
                    ),
                    0.0,
                )
            }
        };
        let (program, args) = self.interpreters.command_for(&target);

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        // Own process group, so a timeout can take down grandchildren too.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionResult::exception(
                    format!("failed to launch {}: {e}", program.display()),
                    started.elapsed().as_secs_f64(),
                )
            }
        };
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.config.max_output_bytes;

        let waited = tokio::time::timeout(timeout, async {
            tokio::join!(
                read_capped(stdout, limit),
                read_capped(stderr, limit),
                child.wait()
            )
        })
        .await;

        match waited {
            Ok((stdout, stderr, Ok(status))) => {
                let exit_code = status.code();
                ExecutionResult {
                    status: if status.success() {
                        ExecutionStatus::Success
                    } else {
                        ExecutionStatus::Error
                    },
                    stdout,
                    stderr: with_signal_note(stderr, &status),
                    duration_seconds: started.elapsed().as_secs_f64(),
                    exit_code,
                }
            }
            Ok((stdout, stderr, Err(e))) => ExecutionResult {
                status: ExecutionStatus::Exception,
                stdout,
                stderr: format!("{stderr}failed to wait for child: {e}"),
                duration_seconds: started.elapsed().as_secs_f64(),
                exit_code: None,
            },
            Err(_elapsed) => {
                kill_process_group(pid);
                // Reaps the direct child; kill_on_drop covers a cancelled await.
                if let Err(e) = child.kill().await {
                    debug!(pid = ?pid, error = %e, "child already gone after timeout");
                }
                ExecutionResult {
                    status: ExecutionStatus::Timeout,
                    stdout: String::new(),
                    stderr: format!(
                        "execution timed out after {}s",
                        self.config.timeout_seconds
                    ),
                    duration_seconds: self.config.timeout_seconds,
                    exit_code: None,
                }
            }
        }
    }

    /// With a custom working directory, relative paths would resolve against
    /// the wrong base.
    fn resolve_target(&self, filepath: &Path) -> std::io::Result<PathBuf> {
        if self.config.working_dir.is_some() && filepath.is_relative() {
            filepath.canonicalize()
        } else {
            Ok(filepath.to_path_buf())
        }
    }
}

/// Read a stream to EOF keeping at most `limit` bytes. The rest is drained so
/// the child never blocks on a full pipe.
async fn read_capped<R>(stream: Option<R>, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return String::new();
    };
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                if n > room {
                    truncated = true;
                }
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    let mut text = String::from_utf8_lossy(&kept).into_owned();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

#[cfg(unix)]
fn with_signal_note(mut stderr: String, status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("terminated by signal {signal}"));
    }
    stderr
}

#[cfg(not(unix))]
fn with_signal_note(stderr: String, _status: &std::process::ExitStatus) -> String {
    stderr
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(pid, error = %e, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_capped_truncates_and_drains() {
        let data = vec![b'x'; 10_000];
        let text = read_capped(Some(&data[..]), 100).await;
        assert!(text.starts_with(&"x".repeat(100)));
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.len(), 100 + TRUNCATION_MARKER.len());
    }

    #[tokio::test]
    async fn test_read_capped_under_limit() {
        let text = read_capped(Some(&b"hello\n"[..]), 100).await;
        assert_eq!(text, "hello\n");
        let none: Option<&[u8]> = None;
        assert_eq!(read_capped(none, 100).await, "");
    }
}
