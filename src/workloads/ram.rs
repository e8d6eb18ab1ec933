//! RAM workload: grow a buffer step by step, touching every byte each time

use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{percent_of, Workload, WorkloadError, WorkloadOutput};
use crate::bench::power::PowerMeter;
use crate::bench::sink::ProgressSink;
use crate::config::RamConfig;
use crate::util::{format_bytes, throughput_gibps};

pub const BANDWIDTH: &str = "bandwidth";

const MIB: usize = 1024 * 1024;

pub struct RamWorkload {
    config: RamConfig,
    meter: Arc<dyn PowerMeter>,
}

impl RamWorkload {
    pub fn new(config: RamConfig, meter: Arc<dyn PowerMeter>) -> Self {
        Self { config, meter }
    }

    /// Size the buffer reaches after `step` (1-based) of `iterations`
    fn target_len(&self, step: usize) -> usize {
        let total = self.config.memory_mb * MIB;
        if step >= self.config.iterations {
            total
        } else {
            total / self.config.iterations * step
        }
    }
}

impl Workload for RamWorkload {
    fn run(&self, sink: &dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError> {
        sink.report_status("Running RAM Benchmark");

        let iterations = self.config.iterations;
        if iterations == 0 {
            return Err(WorkloadError::Kernel(
                "RAM benchmark needs at least one iteration".to_string(),
            ));
        }

        let mut buffer: Vec<u8> = Vec::new();
        let mut touched = 0u64;
        let mut touch_time = Duration::ZERO;

        for step in 1..=iterations {
            let target = self.target_len(step);
            buffer.try_reserve_exact(target - buffer.len()).map_err(|e| {
                WorkloadError::Kernel(format!(
                    "could not grow buffer to {}: {}",
                    format_bytes(target as u64),
                    e
                ))
            })?;
            buffer.resize(target, 0);

            let start = Instant::now();
            for byte in buffer.iter_mut() {
                *byte = byte.wrapping_add(1);
            }
            black_box(&buffer);
            touch_time += start.elapsed();
            touched += buffer.len() as u64;

            sink.report_progress(percent_of(step, iterations));
        }

        let bandwidth = throughput_gibps(touched, touch_time);
        debug!(
            size = %format_bytes(buffer.len() as u64),
            touched = %format_bytes(touched),
            bandwidth,
            "RAM benchmark finished"
        );

        let mut scores = BTreeMap::new();
        scores.insert(BANDWIDTH.to_string(), bandwidth);
        Ok(WorkloadOutput::from_scores(scores, self.meter.measure_wattage()))
    }
}
