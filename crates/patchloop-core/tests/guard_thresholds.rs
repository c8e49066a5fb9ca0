use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use patchloop_core::{
    ExecutionStatus, GuardConfig, ResourceGuard, ResourceSampler, ResourceSnapshot,
    SandboxConfig, SandboxedExecutor, StaticSampler,
};

/// Counts how often the guard asked for a reading.
struct CountingSampler {
    inner: StaticSampler,
    calls: AtomicUsize,
}

#[async_trait]
impl ResourceSampler for CountingSampler {
    async fn sample(&self) -> ResourceSnapshot {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sample().await
    }
}

fn guard_with(cpu: f64, ram: f64, acc: f64) -> ResourceGuard {
    ResourceGuard::new(
        GuardConfig::default(),
        Arc::new(StaticSampler::new(cpu, ram, acc)),
    )
}

fn write_marker_script(dir: &Path) -> std::path::PathBuf {
    let script = dir.join("touch.sh");
    let marker = dir.join("ran.marker");
    std::fs::write(&script, format!("touch '{}'\n", marker.display())).unwrap();
    script
}

#[tokio::test]
async fn any_metric_at_threshold_blocks() {
    for (cpu, ram, acc) in [(85.0, 0.0, 0.0), (0.0, 85.0, 0.0), (0.0, 0.0, 90.0)] {
        let verdict = guard_with(cpu, ram, acc).check().await;
        assert!(!verdict.safe, "cpu={cpu} ram={ram} acc={acc}");
        assert_eq!(verdict.exceeded.len(), 1);
    }
}

#[tokio::test]
async fn all_metrics_below_threshold_pass() {
    assert!(guard_with(84.99, 84.99, 89.99).is_safe_to_proceed().await);
}

#[tokio::test]
async fn overloaded_cpu_skips_without_spawning() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_marker_script(dir.path());

    let executor = SandboxedExecutor::new(SandboxConfig::default(), guard_with(90.0, 10.0, 0.0));
    let result = executor.run_file_safe(&script).await;

    assert_eq!(result.status, ExecutionStatus::Skipped);
    assert_eq!(result.exit_code, None);
    assert!(result.stderr.contains("cpu"));
    assert!(!dir.path().join("ran.marker").exists());
}

#[tokio::test]
async fn safe_mode_off_bypasses_guard() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_marker_script(dir.path());
    let sampler = Arc::new(CountingSampler {
        inner: StaticSampler::new(99.0, 99.0, 99.0),
        calls: AtomicUsize::new(0),
    });
    let guard = ResourceGuard::new(GuardConfig::default(), sampler.clone());
    let config = SandboxConfig {
        safe_mode_enabled: false,
        ..SandboxConfig::default()
    };

    let result = SandboxedExecutor::new(config, guard).run_file_safe(&script).await;

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);
    assert!(dir.path().join("ran.marker").exists());
}

#[tokio::test]
async fn guard_is_sampled_before_every_run() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_marker_script(dir.path());
    let sampler = Arc::new(CountingSampler {
        inner: StaticSampler::idle(),
        calls: AtomicUsize::new(0),
    });
    let guard = ResourceGuard::new(GuardConfig::default(), sampler.clone());
    let executor = SandboxedExecutor::new(SandboxConfig::default(), guard);

    executor.run_file_safe(&script).await;
    executor.run_file_safe(&script).await;

    assert_eq!(sampler.calls.load(Ordering::SeqCst), 2);
}
