//! Host load sampling backed by `sysinfo` and `nvidia-smi`.

use std::time::Duration;

use async_trait::async_trait;
use sysinfo::System;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::warn;

use crate::guard::{ResourceSampler, ResourceSnapshot};

const NVIDIA_SMI_TIMEOUT: Duration = Duration::from_secs(5);

/// Samples CPU and RAM through `sysinfo`, accelerator memory through
/// `nvidia-smi`.
pub struct SystemSampler {
    system: Mutex<System>,
    query_accelerator: bool,
    query_program: String,
}

impl SystemSampler {
    pub fn new(query_accelerator: bool) -> Self {
        Self {
            system: Mutex::new(System::new()),
            query_accelerator,
            query_program: "nvidia-smi".to_string(),
        }
    }

    /// Query accelerator memory through `program` instead of `nvidia-smi`.
    /// It must accept the same arguments and print the same CSV.
    pub fn with_query_program(mut self, program: impl Into<String>) -> Self {
        self.query_program = program.into();
        self
    }

    async fn cpu_and_ram(&self) -> (f64, f64) {
        let mut sys = self.system.lock().await;
        // CPU usage is a delta between two refreshes.
        sys.refresh_cpu();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu();
        sys.refresh_memory();

        let cpu = f64::from(sys.global_cpu_info().cpu_usage());
        let total = sys.total_memory();
        let ram = if total == 0 {
            0.0
        } else {
            sys.used_memory() as f64 / total as f64 * 100.0
        };
        (cpu, ram)
    }

    async fn accelerator(&self) -> f64 {
        if !self.query_accelerator {
            return 0.0;
        }
        accelerator_reading(query_nvidia_smi(&self.query_program).await)
    }
}

/// A failed query is not an error: it is logged and reads as 0.
pub(crate) fn accelerator_reading(query: Result<f64, String>) -> f64 {
    match query {
        Ok(percent) => percent,
        Err(reason) => {
            warn!(event = "guard.accelerator_unavailable", reason = %reason);
            0.0
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ResourceSampler for SystemSampler {
    async fn sample(&self) -> ResourceSnapshot {
        let (cpu, ram) = self.cpu_and_ram().await;
        let accelerator = self.accelerator().await;
        ResourceSnapshot::new(cpu, ram, accelerator)
    }
}

async fn query_nvidia_smi(program: &str) -> Result<f64, String> {
    let output = Command::new(program)
        .args([
            "--query-gpu=memory.used,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(NVIDIA_SMI_TIMEOUT, output)
        .await
        .map_err(|_| format!("{program} timed out"))?
        .map_err(|e| format!("{program} not runnable: {e}"))?;

    if !output.status.success() {
        return Err(format!("{program} exited with {}", output.status));
    }
    parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `memory.used, memory.total` rows and return the busiest device's
/// memory utilization in percent.
pub(crate) fn parse_nvidia_smi(stdout: &str) -> Result<f64, String> {
    let mut busiest: Option<f64> = None;
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let (used, total) = line
            .split_once(',')
            .ok_or_else(|| format!("unexpected nvidia-smi row: {line:?}"))?;
        let used: f64 = used
            .trim()
            .parse()
            .map_err(|_| format!("bad memory.used in {line:?}"))?;
        let total: f64 = total
            .trim()
            .parse()
            .map_err(|_| format!("bad memory.total in {line:?}"))?;
        if total <= 0.0 {
            continue;
        }
        let percent = used / total * 100.0;
        busiest = Some(busiest.map_or(percent, |b| b.max(percent)));
    }
    busiest.ok_or_else(|| "no GPU reported".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_gpu() {
        let pct = parse_nvidia_smi("4096, 8192\n").unwrap();
        assert!((pct - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_takes_busiest_gpu() {
        let pct = parse_nvidia_smi("100, 1000\n900, 1000\n").unwrap();
        assert!((pct - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_nvidia_smi("No devices were found").is_err());
        assert!(parse_nvidia_smi("").is_err());
        assert!(parse_nvidia_smi("abc, 100").is_err());
    }

    #[test]
    fn test_failed_gpu_query_reads_zero_and_stays_safe() {
        use crate::config::GuardConfig;
        use crate::guard::ResourceGuard;
        use std::sync::Arc;

        let reading = accelerator_reading(Err("nvidia-smi not runnable: not found".to_string()));
        assert_eq!(reading, 0.0);
        assert_eq!(accelerator_reading(parse_nvidia_smi("No devices were found")), 0.0);
        assert_eq!(accelerator_reading(Ok(42.0)), 42.0);

        let guard = ResourceGuard::new(
            GuardConfig::default(),
            Arc::new(crate::guard::StaticSampler::idle()),
        );
        let verdict = guard.evaluate(ResourceSnapshot::new(10.0, 20.0, reading));
        assert_eq!(verdict.snapshot.accelerator_percent, 0.0);
        assert!(verdict.safe);
    }

    #[tokio::test]
    async fn test_missing_query_program_samples_zero() {
        let sampler =
            SystemSampler::new(true).with_query_program("/nonexistent/patchloop-gpu-stats");
        let snap = sampler.sample().await;
        assert_eq!(snap.accelerator_percent, 0.0);
        assert!(snap.cpu_percent >= 0.0);
    }

    #[tokio::test]
    async fn test_accelerator_query_disabled_reads_zero() {
        let sampler = SystemSampler::new(false);
        assert_eq!(sampler.accelerator().await, 0.0);
    }

    #[tokio::test]
    async fn test_system_sample_is_non_negative() {
        let snap = SystemSampler::new(false).sample().await;
        assert!(snap.cpu_percent >= 0.0);
        assert!(snap.ram_percent >= 0.0);
        assert_eq!(snap.accelerator_percent, 0.0);
    }
}
