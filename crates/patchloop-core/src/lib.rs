//! patchloop-core: safe execution and self-repair for generated code.
//!
//! A file is run under a resource guard and a wall-clock limit. Failures are
//! written to a ledger, a human is asked before anything is rewritten, and a
//! code generator produces the fix. The loop is bounded and fails closed.
//!
//! ## Key Components
//!
//! - [`ResourceGuard`]: point-in-time CPU/RAM/accelerator admission check
//! - [`SandboxedExecutor`]: process-group isolated run with hard timeout
//! - [`ErrorLedger`]: latest error per normalized path, durable
//! - [`RepairOrchestrator`]: the guarded run / confirm / repair state machine
//! - [`CodeWriter`]: generate, update and batch-write files, keeping the
//!   structure index current
//! - [`PromptInbox`]: turns dropped prompt files into generated files
//! - [`PatchloopContext`]: wires all of the above from one config

pub mod config;
pub mod confirm;
pub mod context;
pub mod digest;
pub mod directive;
pub mod error;
pub mod file_key;
pub mod generator;
pub mod guard;
pub mod history;
pub mod ledger;
pub mod lint;
pub mod memory;
pub mod obs;
pub mod orchestrator;
pub mod prompts;
pub mod report;
pub mod sampler;
pub mod sandbox;
pub mod telemetry;
pub mod writer;

pub use config::{
    GeneratorConfig, GuardConfig, LintConfig, PatchloopConfig, RepairPolicy, SandboxConfig,
    StateConfig, DEFAULT_CONFIG_FILE,
};
pub use confirm::{AutoApprove, AutoDeny, ConfirmDecision, ConfirmationGate, FixRequest, ScriptedGate};
pub use context::PatchloopContext;
pub use digest::ContentDigest;
pub use directive::{parse_batch, parse_update_directive, BatchEntry, ParseError, UpdateDirective};
pub use error::{PatchloopError, Result};
pub use file_key::FileKey;
pub use generator::{CodeGenerator, GenerationRequest, OllamaGenerator, ScriptedGenerator};
pub use guard::{GuardVerdict, Metric, ResourceGuard, ResourceSampler, ResourceSnapshot, StaticSampler};
pub use history::{AttemptState, RunHistory};
pub use ledger::{ErrorLedger, ErrorRecord};
pub use lint::{CommandLinter, LintReport, LintStatus, Linter, LinterRegistry, NoOpLinter};
pub use memory::{LineIndexer, MemoryEntry, MemoryIndex, MemorySnapshot, ScanSummary, StructureIndexer};
pub use orchestrator::{
    AppliedRepair, FixOutcome, RepairOrchestrator, RepairReport, RepairState, StopReason, Transition,
};
pub use prompts::{InboxPass, PromptInbox};
pub use report::{read_report_artifact, write_report_artifact};
pub use sampler::SystemSampler;
pub use sandbox::{ExecutionResult, ExecutionStatus, InterpreterTable, SandboxedExecutor};
pub use telemetry::init_tracing;
pub use writer::{CodeWriter, WriteOutcome};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
