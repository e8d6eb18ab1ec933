//! Benchmark workloads
//!
//! Each workload stresses one subsystem, reports progress through a
//! [`ProgressSink`] and returns its scores in the common
//! `(per-test scores, total score, total wattage)` shape.

pub mod cpu;
pub mod gpu;
pub mod neural;
pub mod ram;
pub mod ssd;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::bench::power::PowerMeter;
use crate::bench::sink::ProgressSink;
use crate::config::BenchmarkConfig;
use crate::models::Subsystem;

pub use cpu::CpuWorkload;
pub use gpu::GpuWorkload;
pub use neural::NeuralWorkload;
pub use ram::RamWorkload;
pub use ssd::SsdWorkload;

/// Errors raised by a workload while it runs
#[derive(Error, Debug)]
pub enum WorkloadError {
    /// File or device I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Data read back differs from what was written
    #[error("verification failed: {0}")]
    Verification(String),
    /// The kernel could not run with the given parameters
    #[error("kernel error: {0}")]
    Kernel(String),
    /// The workload panicked; carries the panic message
    #[error("workload panicked: {0}")]
    Panicked(String),
}

/// Scores produced by one workload run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkloadOutput {
    pub per_test_scores: BTreeMap<String, f64>,
    pub total_score: f64,
    pub total_wattage: f64,
}

impl WorkloadOutput {
    /// Build an output whose total is the sum of the per-test scores
    pub fn from_scores(per_test_scores: BTreeMap<String, f64>, total_wattage: f64) -> Self {
        let total_score = per_test_scores.values().sum();
        Self {
            per_test_scores,
            total_score,
            total_wattage,
        }
    }
}

/// A unit of benchmark work executed by a runner
///
/// `run` is called exactly once, on the runner's worker thread. It may call
/// the sink any number of times from any thread it spawns.
pub trait Workload: Send + Sync {
    fn run(&self, sink: &dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError>;
}

/// Adapts a closure into a [`Workload`]
pub struct FnWorkload<F>(pub F);

impl<F> Workload for FnWorkload<F>
where
    F: Fn(&dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError> + Send + Sync,
{
    fn run(&self, sink: &dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError> {
        (self.0)(sink)
    }
}

/// Wrap a closure as a shareable workload
pub fn workload_fn<F>(f: F) -> Arc<dyn Workload>
where
    F: Fn(&dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError> + Send + Sync + 'static,
{
    Arc::new(FnWorkload(f))
}

/// Build the configured workload for a subsystem
pub fn workload_for(
    subsystem: Subsystem,
    config: &BenchmarkConfig,
    meter: Arc<dyn PowerMeter>,
) -> Arc<dyn Workload> {
    match subsystem {
        Subsystem::Cpu => Arc::new(CpuWorkload::new(config.cpu.clone(), meter)),
        Subsystem::Gpu => Arc::new(GpuWorkload::new(config.gpu.clone(), meter)),
        Subsystem::Ram => Arc::new(RamWorkload::new(config.ram.clone(), meter)),
        Subsystem::Ssd => Arc::new(SsdWorkload::new(config.ssd.clone(), meter)),
        Subsystem::Neural => Arc::new(NeuralWorkload::new(config.neural.clone(), meter)),
    }
}

/// Reports 0, 10, .. 100 for one concurrent sub-test, each step exactly once,
/// paired with a `"<title> Benchmark Progress: N%"` status
pub(crate) struct Milestones<'a> {
    title: &'static str,
    sink: &'a dyn ProgressSink,
    next: i32,
}

impl<'a> Milestones<'a> {
    pub(crate) fn new(title: &'static str, sink: &'a dyn ProgressSink) -> Self {
        Self {
            title,
            sink,
            next: 0,
        }
    }

    /// Report every step not yet reported up to `percent`
    pub(crate) fn advance_to(&mut self, percent: i32) {
        while self.next <= percent && self.next <= 100 {
            self.sink.report_progress(self.next);
            self.sink.report_status(&format!(
                "{} Benchmark Progress: {}%",
                self.title, self.next
            ));
            self.next += 10;
        }
    }
}

/// Percent of `done` out of `total`, 100 when there is nothing to do
pub(crate) fn percent_of(done: usize, total: usize) -> i32 {
    if total == 0 {
        100
    } else {
        ((done as f64 / total as f64) * 100.0) as i32
    }
}
