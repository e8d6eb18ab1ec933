//! CPU workload: recursive Fibonacci on one core, then on all cores

use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use super::{percent_of, Workload, WorkloadError, WorkloadOutput};
use crate::bench::power::PowerMeter;
use crate::bench::sink::ProgressSink;
use crate::config::CpuConfig;

pub const SINGLE_CORE_TEST: &str = "Single-Core Test";
pub const MULTI_CORE_TEST: &str = "Multi-Core Test";

pub struct CpuWorkload {
    config: CpuConfig,
    meter: Arc<dyn PowerMeter>,
}

impl CpuWorkload {
    pub fn new(config: CpuConfig, meter: Arc<dyn PowerMeter>) -> Self {
        Self { config, meter }
    }

    /// Mean seconds per calculation, timed one after another
    fn single_core(&self, sink: &dyn ProgressSink) -> f64 {
        sink.report_status("Running Single-Core Test");

        let iterations = self.config.single_core_iterations;
        let mut total_secs = 0.0;
        for i in 0..iterations {
            let start = Instant::now();
            black_box(fibonacci(black_box(self.config.fibonacci_depth)));
            total_secs += start.elapsed().as_secs_f64();

            sink.report_progress(percent_of(i + 1, iterations));
        }

        total_secs / iterations.max(1) as f64
    }

    /// Wall seconds for all calculations divided by their count
    fn multi_core(&self, sink: &dyn ProgressSink) -> f64 {
        sink.report_status("Running Multi-Core Test");

        let calculations = match self.config.multi_core_calculations {
            0 => num_cpus::get(),
            n => n,
        };
        let depth = self.config.fibonacci_depth;
        let done = AtomicUsize::new(0);

        let start = Instant::now();
        (0..calculations).into_par_iter().for_each(|_| {
            black_box(fibonacci(black_box(depth)));
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            sink.report_progress(percent_of(finished, calculations));
        });
        let wall_secs = start.elapsed().as_secs_f64();

        debug!(
            calculations,
            threads = rayon::current_num_threads(),
            wall_secs,
            "multi-core test finished"
        );
        wall_secs / calculations.max(1) as f64
    }
}

impl Workload for CpuWorkload {
    fn run(&self, sink: &dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError> {
        let mut scores = BTreeMap::new();

        scores.insert(SINGLE_CORE_TEST.to_string(), self.single_core(sink));
        sink.report_progress(0);
        scores.insert(MULTI_CORE_TEST.to_string(), self.multi_core(sink));

        let wattage = self.meter.measure_wattage();
        Ok(WorkloadOutput::from_scores(scores, wattage))
    }
}

pub fn fibonacci(n: u32) -> u64 {
    if n <= 1 {
        n as u64
    } else {
        fibonacci(n - 1) + fibonacci(n - 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::power::FixedMeter;
    use crate::bench::sink::RecordingSink;

    fn tiny() -> CpuConfig {
        CpuConfig {
            fibonacci_depth: 15,
            single_core_iterations: 4,
            multi_core_calculations: 3,
        }
    }

    #[test]
    fn test_fibonacci() {
        assert_eq!(fibonacci(0), 0);
        assert_eq!(fibonacci(1), 1);
        assert_eq!(fibonacci(10), 55);
        assert_eq!(fibonacci(20), 6765);
    }

    #[test]
    fn test_output_shape() {
        let workload = CpuWorkload::new(tiny(), Arc::new(FixedMeter(4.5)));
        let sink = RecordingSink::new();
        let output = workload.run(&sink).unwrap();

        assert_eq!(output.per_test_scores.len(), 2);
        let single = output.per_test_scores[SINGLE_CORE_TEST];
        let multi = output.per_test_scores[MULTI_CORE_TEST];
        assert!(single >= 0.0);
        assert!(multi >= 0.0);
        assert!((output.total_score - (single + multi)).abs() < 1e-12);
        assert_eq!(output.total_wattage, 4.5);
    }

    #[test]
    fn test_progress_resets_between_tests() {
        let workload = CpuWorkload::new(tiny(), Arc::new(FixedMeter(0.0)));
        let sink = RecordingSink::new();
        workload.run(&sink).unwrap();

        let percents = sink.percents();
        assert_eq!(&percents[..5], &[25, 50, 75, 100, 0]);
        // Multi-core completions may arrive out of order, but all three arrive
        let mut multi = percents[5..].to_vec();
        multi.sort_unstable();
        assert_eq!(multi, vec![33, 66, 100]);

        assert_eq!(
            sink.statuses(),
            vec!["Running Single-Core Test", "Running Multi-Core Test"]
        );
    }

    #[test]
    fn test_zero_calculations_uses_every_cpu() {
        let config = CpuConfig {
            multi_core_calculations: 0,
            ..tiny()
        };
        let workload = CpuWorkload::new(config, Arc::new(FixedMeter(0.0)));
        let sink = RecordingSink::new();
        workload.run(&sink).unwrap();

        // 4 single-core reports, the reset, then one per logical CPU
        assert_eq!(sink.percents().len(), 5 + num_cpus::get());
    }
}
