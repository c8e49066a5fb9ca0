//! Runtime configuration.
//!
//! Every component receives its section at construction. Nothing reads
//! global state, so tests can build components with arbitrary thresholds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PatchloopError, Result};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "patchloop.toml";

/// Top-level configuration, one field per `patchloop.toml` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchloopConfig {
    pub guard: GuardConfig,
    pub sandbox: SandboxConfig,
    pub repair: RepairPolicy,
    pub generator: GeneratorConfig,
    pub lint: LintConfig,
    pub state: StateConfig,
}

impl PatchloopConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file absent, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PatchloopError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("guard.cpu_threshold", self.guard.cpu_threshold),
            ("guard.ram_threshold", self.guard.ram_threshold),
            ("guard.accelerator_threshold", self.guard.accelerator_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PatchloopError::Config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        let timeout = self.sandbox.timeout_seconds;
        if !timeout.is_finite() || timeout <= 0.0 || timeout > MAX_TIMEOUT_SECONDS {
            return Err(PatchloopError::Config(format!(
                "sandbox.timeout_seconds must be in (0, {MAX_TIMEOUT_SECONDS}], got {timeout}"
            )));
        }
        if self.repair.max_attempts == 0 {
            return Err(PatchloopError::Config(
                "repair.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.generator.endpoint.trim().is_empty() {
            return Err(PatchloopError::Config(
                "generator.endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resource guard thresholds, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub cpu_threshold: f64,
    pub ram_threshold: f64,
    pub accelerator_threshold: f64,
    /// Query `nvidia-smi` for accelerator memory. When off the reading is 0.
    pub query_accelerator: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: 85.0,
            ram_threshold: 85.0,
            accelerator_threshold: 90.0,
            query_accelerator: true,
        }
    }
}

/// Upper bound for `sandbox.timeout_seconds` (one day).
pub const MAX_TIMEOUT_SECONDS: f64 = 86_400.0;

/// Configuration for sandboxed file execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Hard wall-clock limit per run.
    pub timeout_seconds: f64,
    /// Consult the resource guard before spawning.
    pub safe_mode_enabled: bool,
    /// Per-stream capture cap. Output past it is drained and dropped.
    pub max_output_bytes: usize,
    /// Extension (without dot) to interpreter argv, merged over the built-ins.
    pub interpreters: BTreeMap<String, Vec<String>>,
    /// Working directory for the child. Defaults to the caller's.
    pub working_dir: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15.0,
            safe_mode_enabled: true,
            max_output_bytes: 1024 * 1024,
            interpreters: BTreeMap::new(),
            working_dir: None,
        }
    }
}

/// Bounded repair policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairPolicy {
    /// Execution attempts per session, repairs included.
    pub max_attempts: u32,
    /// Instruction handed to the generator alongside the error record.
    pub fix_instruction: String,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            fix_instruction: "Fix all bugs and errors.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "deepseek-coder".to_string(),
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    pub enabled: bool,
    /// Per-linter time limit.
    pub timeout_secs: u64,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 60,
        }
    }
}

/// Where persisted state lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".patchloop"),
        }
    }
}

impl StateConfig {
    pub fn errors_path(&self) -> PathBuf {
        self.dir.join("errors.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join("history.json")
    }

    pub fn memory_path(&self) -> PathBuf {
        self.dir.join("memory.json")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.dir.join("sessions")
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("patchloop.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PatchloopConfig::default();
        assert_eq!(cfg.guard.cpu_threshold, 85.0);
        assert_eq!(cfg.guard.ram_threshold, 85.0);
        assert_eq!(cfg.guard.accelerator_threshold, 90.0);
        assert_eq!(cfg.sandbox.timeout_seconds, 15.0);
        assert!(cfg.sandbox.safe_mode_enabled);
        assert_eq!(cfg.repair.max_attempts, 3);
        assert_eq!(cfg.generator.model, "deepseek-coder");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let cfg = PatchloopConfig::from_toml(
            r#"
            [guard]
            cpu_threshold = 70.0

            [sandbox]
            timeout_seconds = 2.5

            [sandbox.interpreters]
            py = ["python3", "-u"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.guard.cpu_threshold, 70.0);
        assert_eq!(cfg.guard.ram_threshold, 85.0);
        assert_eq!(cfg.sandbox.timeout_seconds, 2.5);
        assert_eq!(
            cfg.sandbox.interpreters.get("py"),
            Some(&vec!["python3".to_string(), "-u".to_string()])
        );
        assert_eq!(cfg.repair, RepairPolicy::default());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = PatchloopConfig::from_toml("[repair]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, PatchloopError::Config(_)));
    }

    #[test]
    fn test_rejects_non_positive_timeout() {
        let err = PatchloopConfig::from_toml("[sandbox]\ntimeout_seconds = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn test_rejects_timeout_past_upper_bound() {
        let err = PatchloopConfig::from_toml("[sandbox]\ntimeout_seconds = 1e20\n").unwrap_err();
        assert!(matches!(err, PatchloopError::Config(_)));
        assert!(err.to_string().contains("timeout_seconds"));

        let cfg = PatchloopConfig::from_toml("[sandbox]\ntimeout_seconds = 86400\n").unwrap();
        assert_eq!(cfg.sandbox.timeout_seconds, MAX_TIMEOUT_SECONDS);
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = PatchloopConfig::from_toml("[guard\ncpu = ").unwrap_err();
        assert!(matches!(err, PatchloopError::Config(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PatchloopConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, PatchloopConfig::default());
    }

    #[test]
    fn test_state_paths() {
        let state = StateConfig {
            dir: PathBuf::from("/var/lib/pl"),
        };
        assert_eq!(state.errors_path(), PathBuf::from("/var/lib/pl/errors.json"));
        assert_eq!(state.sessions_dir(), PathBuf::from("/var/lib/pl/sessions"));
    }
}
