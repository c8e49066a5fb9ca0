//! Resource guard: a point-in-time admission check before spawning work.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GuardConfig;
use crate::obs;

/// One sample of system load, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub accelerator_percent: f64,
    pub sampled_at: DateTime<Utc>,
}

impl ResourceSnapshot {
    /// Build a snapshot stamped now. Negative or NaN readings become 0.
    pub fn new(cpu_percent: f64, ram_percent: f64, accelerator_percent: f64) -> Self {
        Self {
            cpu_percent: clamp_percent(cpu_percent),
            ram_percent: clamp_percent(ram_percent),
            accelerator_percent: clamp_percent(accelerator_percent),
            sampled_at: Utc::now(),
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_percent,
            Metric::Ram => self.ram_percent,
            Metric::Accelerator => self.accelerator_percent,
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Ram,
    Accelerator,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Cpu, Metric::Ram, Metric::Accelerator];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Ram => "ram",
            Metric::Accelerator => "accelerator",
        }
    }
}

/// A metric that reached its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exceeded {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
}

impl std::fmt::Display for Exceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {:.1}% (limit {:.1}%)",
            self.metric.as_str(),
            self.value,
            self.threshold
        )
    }
}

/// The snapshot together with the decision taken on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardVerdict {
    pub snapshot: ResourceSnapshot,
    pub safe: bool,
    pub exceeded: Vec<Exceeded>,
}

impl GuardVerdict {
    /// Human-readable reason for refusing, empty when safe.
    pub fn reason(&self) -> String {
        self.exceeded
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Source of load readings.
#[async_trait]
pub trait ResourceSampler: Send + Sync {
    /// Take one reading. Unavailable metrics read as 0.
    async fn sample(&self) -> ResourceSnapshot;
}

/// Decides whether execution may proceed under current load.
#[derive(Clone)]
pub struct ResourceGuard {
    config: GuardConfig,
    sampler: Arc<dyn ResourceSampler>,
}

impl ResourceGuard {
    pub fn new(config: GuardConfig, sampler: Arc<dyn ResourceSampler>) -> Self {
        Self { config, sampler }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Pure threshold check. A metric at or above its threshold blocks.
    pub fn evaluate(&self, snapshot: ResourceSnapshot) -> GuardVerdict {
        let exceeded: Vec<Exceeded> = Metric::ALL
            .into_iter()
            .filter_map(|metric| {
                let value = snapshot.value(metric);
                let threshold = self.threshold(metric);
                (value >= threshold).then_some(Exceeded {
                    metric,
                    value,
                    threshold,
                })
            })
            .collect();

        GuardVerdict {
            safe: exceeded.is_empty(),
            snapshot,
            exceeded,
        }
    }

    /// Sample once, evaluate, and log the verdict.
    pub async fn check(&self) -> GuardVerdict {
        let verdict = self.evaluate(self.sampler.sample().await);
        obs::emit_guard_verdict(&verdict);
        verdict
    }

    pub async fn is_safe_to_proceed(&self) -> bool {
        self.check().await.safe
    }

    fn threshold(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.config.cpu_threshold,
            Metric::Ram => self.config.ram_threshold,
            Metric::Accelerator => self.config.accelerator_threshold,
        }
    }
}

/// Sampler returning fixed readings.
#[derive(Debug, Clone)]
pub struct StaticSampler {
    cpu: f64,
    ram: f64,
    accelerator: f64,
}

impl StaticSampler {
    pub fn new(cpu: f64, ram: f64, accelerator: f64) -> Self {
        Self {
            cpu,
            ram,
            accelerator,
        }
    }

    /// Readings that pass any positive threshold.
    pub fn idle() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

#[async_trait]
impl ResourceSampler for StaticSampler {
    async fn sample(&self) -> ResourceSnapshot {
        ResourceSnapshot::new(self.cpu, self.ram, self.accelerator)
    }
}
