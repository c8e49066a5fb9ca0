//! patchloop CLI
//!
//! The `patchloop` command runs locally generated code under a resource
//! guard and repairs failures with a local code model, asking first.
//!
//! ## Commands
//!
//! - `run`: guarded run with the confirm / repair / retry loop
//! - `exec`: one guarded run, no repair
//! - `guard`: sample the host and print the admission verdict
//! - `fix`: repair a file from its latest ledger record
//! - `errors`: inspect or clear the error ledger
//! - `generate`, `update`, `batch`, `explain`: code generation
//! - `prompts`: turn dropped prompt files into generated files
//! - `scan`, `mv`, `rm`: keep the structure index in step with the tree
//! - `memory`: query the structure index
//! - `history`, `sessions`: attempt counters and per-session reports

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use patchloop_core::{
    parse_batch, parse_update_directive, read_report_artifact, report, AutoApprove, AutoDeny,
    ConfirmDecision, ConfirmationGate, ExecutionResult, FixOutcome, FixRequest, InboxPass,
    LintReport, LintStatus, MemorySnapshot, PatchloopConfig, PatchloopContext, PromptInbox,
    RepairReport, UpdateDirective, WriteOutcome, DEFAULT_CONFIG_FILE,
};

#[derive(Parser)]
#[command(name = "patchloop")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Safe execution and self-repair for locally generated code", long_about = None)]
struct Cli {
    /// Configuration file (missing file means defaults)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the state directory
    #[arg(long, global = true, env = "PATCHLOOP_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a file, repairing it on failure until it passes or the loop stops
    Run {
        /// File to run
        file: PathBuf,

        /// Approve every repair without asking
        #[arg(short, long, conflicts_with = "no")]
        yes: bool,

        /// Decline every repair without asking
        #[arg(short, long)]
        no: bool,

        #[command(flatten)]
        limits: RunLimits,

        /// Maximum attempts in this session
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Run a file once under the guard, without repair
    Exec {
        /// File to run
        file: PathBuf,

        #[command(flatten)]
        limits: RunLimits,

        /// Record a failure in the error ledger
        #[arg(long)]
        record: bool,
    },

    /// Sample CPU, RAM and accelerator load and print the verdict
    Guard,

    /// Repair a file from its latest ledger record without running it
    Fix {
        /// File to repair
        file: PathBuf,

        /// Approve without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect the error ledger
    Errors {
        #[command(subcommand)]
        action: ErrorsAction,
    },

    /// Generate a new file from a prompt
    Generate {
        /// Output file
        file: PathBuf,

        /// Prompt text
        #[arg(short, long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the prompt from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,
    },

    /// Rewrite an existing file from an instruction
    Update {
        /// Directive file with `File:` and `Update:` lines
        directive: Option<PathBuf>,

        /// File to update (instead of a directive file)
        #[arg(short, long, conflicts_with = "directive", requires = "instruction")]
        file: Option<PathBuf>,

        /// Instruction text (instead of a directive file)
        #[arg(short, long, conflicts_with = "directive", requires = "file")]
        instruction: Option<String>,
    },

    /// Create every file listed in a batch instruction file
    Batch {
        /// File with `Create a file: <path>` blocks
        instructions: PathBuf,

        /// Directory the batch paths are relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// Turn every `*.txt` prompt in a directory into a generated file
    Prompts {
        /// Inbox directory
        #[arg(default_value = "Prompts")]
        dir: PathBuf,

        /// Where generated files are written
        #[arg(short, long, default_value = "generated")]
        output: PathBuf,

        /// Where handled prompts are moved (default: <dir>/processed)
        #[arg(long)]
        processed: Option<PathBuf>,

        /// Extension of generated files
        #[arg(long, default_value = "py")]
        extension: String,

        /// Keep watching, checking every SECS seconds
        #[arg(long, value_name = "SECS")]
        poll: Option<u64>,
    },

    /// Rebuild the structure index for every source file under a directory
    Scan {
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Explain a file in plain language
    Explain {
        file: PathBuf,
    },

    /// Move a file and rekey its ledger, history and index entries
    Mv {
        from: PathBuf,
        to: PathBuf,
    },

    /// Delete a file and drop its ledger, history and index entries
    Rm {
        file: PathBuf,
    },

    /// Query the structure index
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Show attempt counters and last outcomes
    History {
        /// Only this file
        file: Option<PathBuf>,
    },

    /// Inspect recorded repair sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunLimits {
    /// Wall-clock limit in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Skip the resource guard
    #[arg(long)]
    no_safe_mode: bool,
}

#[derive(Subcommand)]
enum ErrorsAction {
    /// List every recorded failure
    List,

    /// Show the latest record for a file, with traceback
    Show { file: PathBuf },

    /// Forget the record for a file
    Clear { file: PathBuf },
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum MemoryView {
    /// Indexed files with their counts
    List,

    /// Classes per file
    Classes,

    /// Functions per file
    Functions,
}

#[derive(Subcommand)]
enum MemoryAction {
    #[command(flatten)]
    View(MemoryView),

    /// Classes, functions and imports of one file
    Show { file: PathBuf },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List session ids, oldest first
    List,

    /// Print one session report as JSON
    Show { session_id: String },
}

/// Asks on the terminal. Anything but `y`/`yes` declines, including EOF.
struct TerminalGate;

#[async_trait]
impl ConfirmationGate for TerminalGate {
    async fn confirm(&self, request: &FixRequest) -> ConfirmDecision {
        let prompt = format!(
            "{}\n{}\nApply a generated fix? [y/N] ",
            request.summary(),
            request.record.traceback.trim_end()
        );
        let answer = tokio::task::spawn_blocking(move || {
            eprint!("{prompt}");
            std::io::stderr().flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok::<_, std::io::Error>(line)
        })
        .await;
        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            _ => ConfirmDecision::Deny,
        }
    }
}

fn parse_answer(line: &str) -> ConfirmDecision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ConfirmDecision::Approve,
        _ => ConfirmDecision::Deny,
    }
}

fn gate_for(yes: bool, no: bool) -> Arc<dyn ConfirmationGate> {
    if yes {
        Arc::new(AutoApprove)
    } else if no {
        Arc::new(AutoDeny)
    } else {
        Arc::new(TerminalGate)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = PatchloopConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    if let Some(dir) = &cli.state_dir {
        config.state.dir = dir.clone();
    }

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_path = config.state.log_path();
    patchloop_core::init_tracing(cli.json, level, Some(&log_path))
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    match cli.command {
        Commands::Run {
            file,
            yes,
            no,
            limits,
            max_attempts,
        } => {
            apply_limits(&mut config, &limits);
            if let Some(n) = max_attempts {
                config.repair.max_attempts = n;
            }
            let ctx = build_context(config)?;
            cmd_run(&ctx, &file, gate_for(yes, no)).await
        }
        Commands::Exec {
            file,
            limits,
            record,
        } => {
            apply_limits(&mut config, &limits);
            let ctx = build_context(config)?;
            cmd_exec(&ctx, &file, record).await
        }
        Commands::Guard => cmd_guard(&build_context(config)?).await,
        Commands::Fix { file, yes } => {
            cmd_fix(&build_context(config)?, &file, gate_for(yes, false)).await
        }
        Commands::Errors { action } => {
            let ctx = build_context(config)?;
            match action {
                ErrorsAction::List => cmd_errors_list(&ctx),
                ErrorsAction::Show { file } => cmd_errors_show(&ctx, &file),
                ErrorsAction::Clear { file } => cmd_errors_clear(&ctx, &file),
            }
        }
        Commands::Generate {
            file,
            prompt,
            prompt_file,
        } => {
            let prompt = match (prompt, prompt_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read prompt file: {}", path.display()))?,
                (None, None) => bail!("either --prompt or --prompt-file is required"),
            };
            cmd_generate(&build_context(config)?, &prompt, &file).await
        }
        Commands::Update {
            directive,
            file,
            instruction,
        } => {
            let directive = resolve_directive(directive.as_deref(), file, instruction)?;
            cmd_update(&build_context(config)?, &directive).await
        }
        Commands::Batch { instructions, root } => {
            cmd_batch(&build_context(config)?, &instructions, &root).await
        }
        Commands::Prompts {
            dir,
            output,
            processed,
            extension,
            poll,
        } => {
            let mut inbox = PromptInbox::new(dir, output).with_extension(extension);
            if let Some(processed) = processed {
                inbox = inbox.with_processed_dir(processed);
            }
            cmd_prompts(&build_context(config)?, &inbox, poll).await
        }
        Commands::Scan { root } => cmd_scan(&build_context(config)?, &root),
        Commands::Explain { file } => cmd_explain(&build_context(config)?, &file).await,
        Commands::Mv { from, to } => cmd_mv(&build_context(config)?, &from, &to),
        Commands::Rm { file } => cmd_rm(&build_context(config)?, &file),
        Commands::Memory { action } => {
            let ctx = build_context(config)?;
            match action {
                MemoryAction::View(view) => cmd_memory_view(&ctx, view),
                MemoryAction::Show { file } => cmd_memory_show(&ctx, &file),
            }
        }
        Commands::History { file } => cmd_history(&build_context(config)?, file.as_deref()),
        Commands::Sessions { action } => {
            let ctx = build_context(config)?;
            match action {
                SessionsAction::List => cmd_sessions_list(&ctx),
                SessionsAction::Show { session_id } => cmd_sessions_show(&ctx, &session_id),
            }
        }
    }
}

fn apply_limits(config: &mut PatchloopConfig, limits: &RunLimits) {
    if let Some(t) = limits.timeout {
        config.sandbox.timeout_seconds = t;
    }
    if limits.no_safe_mode {
        config.sandbox.safe_mode_enabled = false;
    }
}

fn build_context(config: PatchloopConfig) -> Result<PatchloopContext> {
    PatchloopContext::from_config(config).context("Invalid configuration")
}

fn resolve_directive(
    directive: Option<&Path>,
    file: Option<PathBuf>,
    instruction: Option<String>,
) -> Result<UpdateDirective> {
    match (directive, file, instruction) {
        (Some(path), _, _) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read directive: {}", path.display()))?;
            parse_update_directive(&text)
                .with_context(|| format!("Invalid directive: {}", path.display()))
        }
        (None, Some(filepath), Some(instruction)) => Ok(UpdateDirective {
            filepath,
            instruction,
        }),
        _ => bail!("give a directive file, or both --file and --instruction"),
    }
}

fn exit_for(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Guarded run with the repair loop
async fn cmd_run(
    ctx: &PatchloopContext,
    file: &Path,
    gate: Arc<dyn ConfirmationGate>,
) -> Result<ExitCode> {
    let orchestrator = ctx.orchestrator(gate);
    let report = orchestrator
        .run(file)
        .await
        .with_context(|| format!("Repair loop failed for {}", file.display()))?;
    print_report(&report);
    Ok(exit_for(report.succeeded()))
}

fn print_report(report: &RepairReport) {
    println!("Session:  {}", report.session_id);
    println!("File:     {}", report.filepath);
    println!("Outcome:  {}", report.outcome.as_str());
    println!("Status:   {}", report.status);
    println!(
        "Attempts: {} ({} this session)",
        report.attempts, report.session_attempts
    );
    println!("Fixed:    {}", report.last_fixed);
    print_streams(&report.final_result);
    println!("{}", report.message);
}

fn print_streams(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        println!("--- stdout ---\n{}", result.stdout.trim_end());
    }
    if !result.stderr.is_empty() {
        println!("--- stderr ---\n{}", result.stderr.trim_end());
    }
}

/// One guarded run
async fn cmd_exec(ctx: &PatchloopContext, file: &Path, record: bool) -> Result<ExitCode> {
    let result = ctx.executor.run_file_safe(file).await;
    println!(
        "{} in {:.2}s (exit code: {})",
        result.status,
        result.duration_seconds,
        result
            .exit_code
            .map_or_else(|| "none".to_string(), |c| c.to_string())
    );
    print_streams(&result);

    if record && result.status.is_repairable() {
        ctx.ledger
            .record(file, result.failure_message(), result.stderr.clone())?;
        info!(file = %file.display(), "failure recorded");
    }
    Ok(exit_for(result.is_success()))
}

async fn cmd_guard(ctx: &PatchloopContext) -> Result<ExitCode> {
    let verdict = ctx.guard.check().await;
    let limits = ctx.guard.config();
    let snap = &verdict.snapshot;
    println!("CPU:         {:5.1}% (limit {})", snap.cpu_percent, limits.cpu_threshold);
    println!("RAM:         {:5.1}% (limit {})", snap.ram_percent, limits.ram_threshold);
    println!(
        "Accelerator: {:5.1}% (limit {})",
        snap.accelerator_percent, limits.accelerator_threshold
    );
    if verdict.safe {
        println!("Safe to proceed");
    } else {
        println!("Blocked: {}", verdict.reason());
    }
    Ok(exit_for(verdict.safe))
}

async fn cmd_fix(
    ctx: &PatchloopContext,
    file: &Path,
    gate: Arc<dyn ConfirmationGate>,
) -> Result<ExitCode> {
    let orchestrator = ctx.orchestrator(gate);
    match orchestrator.fix_from_ledger(file).await? {
        FixOutcome::NothingToFix => {
            println!("No recorded error for {}", file.display());
            Ok(ExitCode::SUCCESS)
        }
        FixOutcome::Denied => {
            println!("Repair declined");
            Ok(ExitCode::FAILURE)
        }
        FixOutcome::Repaired(outcome) => {
            print_write(&outcome);
            println!("Run `patchloop run {}` to verify", file.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_errors_list(ctx: &PatchloopContext) -> Result<ExitCode> {
    let entries = ctx.ledger.entries()?;
    if entries.is_empty() {
        println!("No recorded errors");
    }
    for (key, record) in entries {
        println!(
            "{}  {}  {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            key,
            record.error_message
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_errors_show(ctx: &PatchloopContext, file: &Path) -> Result<ExitCode> {
    match ctx.ledger.latest(file) {
        Ok(record) => {
            println!("File:      {}", record.filepath);
            println!("Recorded:  {}", record.timestamp.to_rfc3339());
            println!("Error:     {}", record.error_message);
            println!("--- traceback ---\n{}", record.traceback.trim_end());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_ledger_miss() => {
            println!("No recorded error for {}", file.display());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_errors_clear(ctx: &PatchloopContext, file: &Path) -> Result<ExitCode> {
    match ctx.ledger.clear(file)? {
        Some(record) => println!("Cleared record for {}", record.filepath),
        None => println!("No recorded error for {}", file.display()),
    }
    Ok(ExitCode::SUCCESS)
}

fn lint_status(status: LintStatus) -> &'static str {
    match status {
        LintStatus::Clean => "clean",
        LintStatus::Findings => "findings",
        LintStatus::Unavailable => "unavailable",
        LintStatus::Skipped => "skipped",
    }
}

fn print_lint(report: &LintReport) {
    println!("Lint:   {} ({})", lint_status(report.status), report.linter);
    if report.status == LintStatus::Findings && !report.output.trim().is_empty() {
        println!("{}", report.output.trim_end());
    }
}

fn print_write(outcome: &WriteOutcome) {
    println!("Wrote:  {} ({} bytes)", outcome.path.display(), outcome.bytes);
    println!("Digest: {}", outcome.source_digest.short());
    if !outcome.entry.is_empty() {
        println!(
            "Index:  {} class(es), {} function(s), {} import(s)",
            outcome.entry.classes.len(),
            outcome.entry.functions.len(),
            outcome.entry.imports.len()
        );
    }
    if let Some(lint) = &outcome.lint {
        print_lint(lint);
    }
}

async fn cmd_generate(ctx: &PatchloopContext, prompt: &str, file: &Path) -> Result<ExitCode> {
    let outcome = ctx
        .writer
        .generate_file(prompt, file)
        .await
        .with_context(|| format!("Failed to generate {}", file.display()))?;
    print_write(&outcome);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_update(ctx: &PatchloopContext, directive: &UpdateDirective) -> Result<ExitCode> {
    let outcome = ctx
        .writer
        .apply_update(directive)
        .await
        .with_context(|| format!("Failed to update {}", directive.filepath.display()))?;
    print_write(&outcome);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_batch(ctx: &PatchloopContext, instructions: &Path, root: &Path) -> Result<ExitCode> {
    let text = std::fs::read_to_string(instructions)
        .with_context(|| format!("Failed to read batch file: {}", instructions.display()))?;
    let entries = parse_batch(&text)
        .with_context(|| format!("Invalid batch file: {}", instructions.display()))?;
    let outcomes = ctx.writer.write_batch(root, &entries).await?;
    for outcome in &outcomes {
        print_write(outcome);
    }
    println!("{} file(s) created", outcomes.len());
    Ok(ExitCode::SUCCESS)
}

/// Drain the prompt inbox once, or keep draining until interrupted
async fn cmd_prompts(
    ctx: &PatchloopContext,
    inbox: &PromptInbox,
    poll: Option<u64>,
) -> Result<ExitCode> {
    let Some(secs) = poll else {
        let pass = drain_inbox(ctx, inbox).await?;
        if pass.is_empty() {
            println!("No prompts in {}", inbox.dir().display());
        }
        return Ok(exit_for(pass.failed.is_empty()));
    };

    let interval = Duration::from_secs(secs.max(1));
    info!(dir = %inbox.dir().display(), interval_secs = interval.as_secs(), "watching prompt inbox");
    loop {
        if let Err(e) = drain_inbox(ctx, inbox).await {
            warn!(error = %e, "prompt pass failed");
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("prompt watch stopped");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}

async fn drain_inbox(ctx: &PatchloopContext, inbox: &PromptInbox) -> Result<InboxPass> {
    let pass = inbox
        .drain(&ctx.writer)
        .await
        .with_context(|| format!("Failed to process prompts in {}", inbox.dir().display()))?;
    for outcome in &pass.generated {
        print_write(outcome);
    }
    for path in &pass.skipped {
        println!("Skipped empty prompt {}", path.display());
    }
    for (path, error) in &pass.failed {
        println!("Failed:  {} ({error})", path.display());
    }
    Ok(pass)
}

fn cmd_scan(ctx: &PatchloopContext, root: &Path) -> Result<ExitCode> {
    let summary = ctx
        .memory
        .scan_directory(root)
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    println!(
        "Indexed {} file(s), {} unreadable, {} stale entr(ies) removed",
        summary.indexed, summary.unreadable, summary.removed
    );
    Ok(ExitCode::SUCCESS)
}

async fn cmd_explain(ctx: &PatchloopContext, file: &Path) -> Result<ExitCode> {
    let text = ctx
        .writer
        .explain_file(file)
        .await
        .with_context(|| format!("Failed to explain {}", file.display()))?;
    println!("{}", text.trim_end());
    Ok(ExitCode::SUCCESS)
}

fn cmd_mv(ctx: &PatchloopContext, from: &Path, to: &Path) -> Result<ExitCode> {
    if to.exists() {
        bail!("destination already exists: {}", to.display());
    }
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(from, to)
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
    ctx.ledger.rename(from, to)?;
    ctx.history.rename(from, to)?;
    ctx.memory.rename(from, to)?;
    println!("Moved {} -> {}", from.display(), to.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_rm(ctx: &PatchloopContext, file: &Path) -> Result<ExitCode> {
    match std::fs::remove_file(file) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(file = %file.display(), "file already gone, dropping state only");
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to delete {}", file.display()));
        }
    }
    ctx.ledger.clear(file)?;
    ctx.history.remove(file)?;
    ctx.memory.remove(file)?;
    println!("Removed {}", file.display());
    Ok(ExitCode::SUCCESS)
}

fn memory_lines(snapshot: &MemorySnapshot, view: MemoryView) -> Vec<String> {
    snapshot
        .iter()
        .map(|(key, entry)| match view {
            MemoryView::List => format!(
                "{key}  classes={} functions={} imports={}",
                entry.classes.len(),
                entry.functions.len(),
                entry.imports.len()
            ),
            MemoryView::Classes => format!("{key}: {}", join_names(&entry.classes)),
            MemoryView::Functions => format!("{key}: {}", join_names(&entry.functions)),
        })
        .collect()
}

fn join_names<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    let joined = names.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

fn cmd_memory_view(ctx: &PatchloopContext, view: MemoryView) -> Result<ExitCode> {
    let snapshot = ctx.memory.snapshot()?;
    if snapshot.is_empty() {
        println!("Structure index is empty");
    }
    for line in memory_lines(&snapshot, view) {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_memory_show(ctx: &PatchloopContext, file: &Path) -> Result<ExitCode> {
    match ctx.memory.get(file)? {
        Some(entry) => {
            println!("File:      {}", file.display());
            println!("Classes:   {}", join_names(&entry.classes));
            println!("Functions: {}", join_names(&entry.functions));
            println!("Imports:   {}", join_names(&entry.imports));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("No index entry for {}", file.display());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_history(ctx: &PatchloopContext, file: Option<&Path>) -> Result<ExitCode> {
    let states = match file {
        Some(path) => ctx.history.get(path)?.into_iter().collect::<Vec<_>>(),
        None => ctx.history.entries()?.into_values().collect(),
    };
    if states.is_empty() {
        println!("No runs recorded");
    }
    for state in states {
        println!(
            "{}  {:<9}  attempts={}  fixed={}  {}",
            state.updated_at.format("%Y-%m-%d %H:%M:%S"),
            state.status.as_str(),
            state.attempts,
            state.last_fixed,
            state.filepath
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_sessions_list(ctx: &PatchloopContext) -> Result<ExitCode> {
    let dir = ctx.config.state.sessions_dir();
    let ids = report::list_sessions(&dir)?;
    if ids.is_empty() {
        println!("No sessions recorded");
    }
    for id in ids {
        println!("{id}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_sessions_show(ctx: &PatchloopContext, session_id: &str) -> Result<ExitCode> {
    let dir = ctx.config.state.sessions_dir();
    let report = read_report_artifact(session_id, &dir)
        .with_context(|| format!("Failed to read session {session_id}"))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}
