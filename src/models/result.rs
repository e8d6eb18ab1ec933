//! Benchmark result data models
//!
//! Contains the subsystem identifiers, the per-run result shape shared by
//! every workload, progress events and the running totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Hardware subsystem a workload stresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Cpu,
    Gpu,
    Ram,
    Ssd,
    Neural,
}

impl Subsystem {
    /// All subsystems in the order they are benchmarked
    pub const ALL: [Subsystem; 5] = [
        Subsystem::Cpu,
        Subsystem::Gpu,
        Subsystem::Ram,
        Subsystem::Ssd,
        Subsystem::Neural,
    ];

    /// Short tab label
    pub fn label(&self) -> &'static str {
        match self {
            Subsystem::Cpu => "CPU",
            Subsystem::Gpu => "GPU",
            Subsystem::Ram => "RAM",
            Subsystem::Ssd => "SSD",
            Subsystem::Neural => "Neural Engine",
        }
    }

    /// Human-readable benchmark title
    pub fn description(&self) -> &'static str {
        match self {
            Subsystem::Cpu => "CPU Benchmark",
            Subsystem::Gpu => "GPU Benchmark",
            Subsystem::Ram => "RAM Benchmark",
            Subsystem::Ssd => "SSD Benchmark",
            Subsystem::Neural => "Neural Engine Benchmark",
        }
    }

    /// Lowercase identifier used on the command line and in files
    pub fn name(&self) -> &'static str {
        match self {
            Subsystem::Cpu => "cpu",
            Subsystem::Gpu => "gpu",
            Subsystem::Ram => "ram",
            Subsystem::Ssd => "ssd",
            Subsystem::Neural => "neural",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Subsystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Subsystem::Cpu),
            "gpu" => Ok(Subsystem::Gpu),
            "ram" | "memory" => Ok(Subsystem::Ram),
            "ssd" | "disk" => Ok(Subsystem::Ssd),
            "neural" | "ne" | "neural-engine" => Ok(Subsystem::Neural),
            other => Err(format!("Unknown subsystem: {}", other)),
        }
    }
}

/// Final output of one completed run
///
/// `total_score` is the sum of `per_test_scores` by convention only; kernels
/// that round their per-test scores may drift from the exact sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Subsystem that produced this result
    pub subsystem: Subsystem,
    /// Timestamp when the run finished
    pub timestamp: DateTime<Utc>,
    /// Wall time of the run
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
    /// Score for each individual test of the workload
    pub per_test_scores: BTreeMap<String, f64>,
    /// Overall score of the run
    pub total_score: f64,
    /// Power drawn during the run, 0.0 when unavailable
    pub total_wattage: f64,
}

impl BenchmarkResult {
    /// Create a new result stamped with the current time
    pub fn new(
        subsystem: Subsystem,
        per_test_scores: BTreeMap<String, f64>,
        total_score: f64,
        total_wattage: f64,
        elapsed: Duration,
    ) -> Self {
        Self {
            subsystem,
            timestamp: Utc::now(),
            elapsed,
            per_test_scores,
            total_score,
            total_wattage,
        }
    }

    /// Whether `total_score` matches the sum of the per-test scores
    pub fn scores_consistent(&self) -> bool {
        let sum: f64 = self.per_test_scores.values().sum();
        (sum - self.total_score).abs() < 1e-6
    }

    /// Whether every score and the wattage are finite numbers
    pub fn is_finite(&self) -> bool {
        self.total_score.is_finite()
            && self.total_wattage.is_finite()
            && self.per_test_scores.values().all(|v| v.is_finite())
    }

    /// Get a human-readable summary of the benchmark result
    pub fn summary(&self) -> String {
        format!(
            "{} - {} - score {:.3} - {:.2} W - {:.2}s",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.subsystem.description(),
            self.total_score,
            self.total_wattage,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Progress reported by a running workload
///
/// `percent` is passed through exactly as the workload reported it and may be
/// out of the 0..=100 range or go backwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressEvent {
    pub percent: i32,
    pub status: String,
}

impl ProgressEvent {
    pub fn new(percent: i32, status: impl Into<String>) -> Self {
        Self {
            percent,
            status: status.into(),
        }
    }

    /// Percent clamped for display widgets that cannot take other values
    pub fn display_percent(&self) -> u16 {
        self.percent.clamp(0, 100) as u16
    }
}

/// Cumulative score and wattage across every completed run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunningTotals {
    pub cumulative_score: f64,
    pub cumulative_wattage: f64,
    /// Number of results recorded
    pub runs: usize,
}

// Custom serde module for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_nanos() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
