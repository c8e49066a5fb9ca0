//! Wiring: builds every component from one [`PatchloopConfig`].

use std::sync::Arc;
use std::time::Duration;

use crate::config::PatchloopConfig;
use crate::confirm::ConfirmationGate;
use crate::error::Result;
use crate::generator::{CodeGenerator, OllamaGenerator};
use crate::guard::{ResourceGuard, ResourceSampler};
use crate::history::RunHistory;
use crate::ledger::ErrorLedger;
use crate::lint::LinterRegistry;
use crate::memory::MemoryIndex;
use crate::orchestrator::RepairOrchestrator;
use crate::sampler::SystemSampler;
use crate::sandbox::SandboxedExecutor;
use crate::writer::CodeWriter;

/// All components, sharing the stores under `config.state.dir`.
#[derive(Clone)]
pub struct PatchloopContext {
    pub config: PatchloopConfig,
    pub guard: ResourceGuard,
    pub executor: SandboxedExecutor,
    pub ledger: ErrorLedger,
    pub history: RunHistory,
    pub memory: MemoryIndex,
    pub writer: CodeWriter,
}

impl PatchloopContext {
    /// Production wiring: host sampler and the Ollama generator.
    pub fn from_config(config: PatchloopConfig) -> Result<Self> {
        config.validate()?;
        let sampler = Arc::new(SystemSampler::new(config.guard.query_accelerator));
        let generator = Arc::new(OllamaGenerator::new(config.generator.clone())?);
        Ok(Self::with_parts(config, sampler, generator))
    }

    pub fn with_parts(
        config: PatchloopConfig,
        sampler: Arc<dyn ResourceSampler>,
        generator: Arc<dyn CodeGenerator>,
    ) -> Self {
        let guard = ResourceGuard::new(config.guard.clone(), sampler);
        let executor = SandboxedExecutor::new(config.sandbox.clone(), guard.clone());
        let ledger = ErrorLedger::open(config.state.errors_path());
        let history = RunHistory::open(config.state.history_path());
        let memory = MemoryIndex::open(config.state.memory_path());
        let linters = if config.lint.enabled {
            LinterRegistry::standard(Duration::from_secs(config.lint.timeout_secs))
        } else {
            LinterRegistry::empty()
        };
        let writer = CodeWriter::new(generator, memory.clone(), linters);

        Self {
            config,
            guard,
            executor,
            ledger,
            history,
            memory,
            writer,
        }
    }

    pub fn orchestrator(&self, gate: Arc<dyn ConfirmationGate>) -> RepairOrchestrator {
        RepairOrchestrator::new(
            self.executor.clone(),
            self.ledger.clone(),
            self.history.clone(),
            self.writer.clone(),
            gate,
            self.config.repair.clone(),
        )
        .with_sessions_dir(self.config.state.sessions_dir())
    }
}
