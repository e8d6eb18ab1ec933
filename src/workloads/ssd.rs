//! SSD workload
//!
//! Verified write/read round trips of several file sizes, then sequential
//! and random-offset passes over one large file. Everything happens in a
//! scratch directory that is removed when the workload returns.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, info};

use super::{percent_of, Workload, WorkloadError, WorkloadOutput};
use crate::bench::power::PowerMeter;
use crate::bench::sink::ProgressSink;
use crate::config::SsdConfig;
use crate::io::scratch::{self, ScratchDir};
use crate::util::{format_bytes, format_score, throughput_gbps};

pub const ROUNDTRIP: &str = "roundtrip";
pub const SEQUENTIAL: &str = "sequential";
pub const RANDOM: &str = "random";

const BLOCK_SIZE: usize = 1024 * 1024;
const LARGE_FILE_PASSES: usize = 4;

/// Bytes moved and time spent in one kind of pass
#[derive(Debug, Default, Clone, Copy)]
struct Transfer {
    bytes: u64,
    time: Duration,
}

impl Transfer {
    fn add(&mut self, bytes: u64, time: Duration) {
        self.bytes += bytes;
        self.time += time;
    }

    fn gbps(&self) -> f64 {
        format_score(throughput_gbps(self.bytes, self.time))
    }
}

pub struct SsdWorkload {
    config: SsdConfig,
    meter: Arc<dyn PowerMeter>,
}

impl SsdWorkload {
    pub fn new(config: SsdConfig, meter: Arc<dyn PowerMeter>) -> Self {
        Self { config, meter }
    }

    fn roundtrips(
        &self,
        dir: &ScratchDir,
        rng: &mut SmallRng,
        progress: &mut Steps<'_>,
    ) -> Result<Transfer, WorkloadError> {
        let mut transfer = Transfer::default();

        for &size_kb in &self.config.file_sizes_kb {
            let path = dir.file(&format!("{}KB_file", size_kb));
            let mut data = vec![0u8; (size_kb * 1024) as usize];
            rng.fill_bytes(&mut data);

            let start = Instant::now();
            scratch::write_synced(&path, &data)?;
            let read_back = scratch::read_all(&path)?;
            transfer.add(2 * data.len() as u64, start.elapsed());

            if read_back != data {
                return Err(WorkloadError::Verification(format!(
                    "{} KiB file read back differs from what was written",
                    size_kb
                )));
            }
            fs::remove_file(&path)?;

            debug!(size = %format_bytes(data.len() as u64), "round trip verified");
            progress.step();
        }

        Ok(transfer)
    }

    fn large_file(
        &self,
        dir: &ScratchDir,
        rng: &mut SmallRng,
        progress: &mut Steps<'_>,
    ) -> Result<(Transfer, Transfer), WorkloadError> {
        let path = dir.file("sequential_file");
        let blocks = self.config.large_file_mb;
        let file_size = blocks * BLOCK_SIZE as u64;

        let mut block = vec![0u8; BLOCK_SIZE];
        rng.fill_bytes(&mut block);
        let offsets: Vec<u64> = (0..blocks)
            .map(|_| rng.gen_range(0..=file_size - BLOCK_SIZE as u64))
            .collect();

        let mut sequential = Transfer::default();
        let mut random = Transfer::default();

        let start = Instant::now();
        scratch::write_blocks(&path, &block, blocks)?;
        sequential.add(file_size, start.elapsed());
        progress.step();

        let start = Instant::now();
        scratch::write_at_offsets(&path, &block, &offsets)?;
        random.add(file_size, start.elapsed());
        progress.step();

        let start = Instant::now();
        let data = scratch::read_all(&path)?;
        sequential.add(data.len() as u64, start.elapsed());
        if data.len() as u64 != file_size {
            return Err(WorkloadError::Verification(format!(
                "sequential file is {} bytes, expected {}",
                data.len(),
                file_size
            )));
        }
        drop(data);
        progress.step();

        let start = Instant::now();
        let read = scratch::read_at_offsets(&path, &mut block, &offsets)?;
        random.add(read, start.elapsed());
        progress.step();

        Ok((sequential, random))
    }
}

impl Workload for SsdWorkload {
    fn run(&self, sink: &dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError> {
        sink.report_status("Running SSD Benchmark");

        let mut dir = ScratchDir::create_in(&self.config.scratch_dir)?;
        if self.config.keep_temp_files {
            dir.keep_on_drop();
            info!(path = %dir.path().display(), "keeping SSD scratch directory");
        }

        let mut rng = SmallRng::from_entropy();
        let mut progress = Steps::new(sink, self.config.file_sizes_kb.len() + LARGE_FILE_PASSES);

        let roundtrip = self.roundtrips(&dir, &mut rng, &mut progress)?;
        let (sequential, random) = self.large_file(&dir, &mut rng, &mut progress)?;

        let mut scores = BTreeMap::new();
        scores.insert(ROUNDTRIP.to_string(), roundtrip.gbps());
        scores.insert(SEQUENTIAL.to_string(), sequential.gbps());
        scores.insert(RANDOM.to_string(), random.gbps());

        Ok(WorkloadOutput::from_scores(scores, self.meter.measure_wattage()))
    }
}

struct Steps<'a> {
    sink: &'a dyn ProgressSink,
    done: usize,
    total: usize,
}

impl<'a> Steps<'a> {
    fn new(sink: &'a dyn ProgressSink, total: usize) -> Self {
        Self { sink, done: 0, total }
    }

    fn step(&mut self) {
        self.done += 1;
        self.sink.report_progress(percent_of(self.done, self.total));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::power::FixedMeter;
    use crate::bench::sink::RecordingSink;
    use tempfile::TempDir;

    fn tiny(parent: &TempDir) -> SsdConfig {
        SsdConfig {
            scratch_dir: parent.path().to_path_buf(),
            file_sizes_kb: vec![4, 16],
            large_file_mb: 2,
            keep_temp_files: false,
        }
    }

    fn entries(parent: &TempDir) -> usize {
        fs::read_dir(parent.path()).unwrap().count()
    }

    #[test]
    fn test_output_shape_and_cleanup() {
        let parent = TempDir::new().unwrap();
        let workload = SsdWorkload::new(tiny(&parent), Arc::new(FixedMeter(1.0)));
        let sink = RecordingSink::new();
        let output = workload.run(&sink).unwrap();

        let keys: Vec<&str> = output.per_test_scores.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![RANDOM, ROUNDTRIP, SEQUENTIAL]);
        assert!(output.per_test_scores.values().all(|&s| s >= 0.0));
        assert_eq!(output.total_wattage, 1.0);

        // 2 round trips and 4 large-file passes
        assert_eq!(sink.percents(), vec![16, 33, 50, 66, 83, 100]);
        assert_eq!(entries(&parent), 0);
    }

    #[test]
    fn test_keep_temp_files() {
        let parent = TempDir::new().unwrap();
        let config = SsdConfig {
            keep_temp_files: true,
            ..tiny(&parent)
        };
        let workload = SsdWorkload::new(config, Arc::new(FixedMeter(0.0)));
        workload.run(&RecordingSink::new()).unwrap();

        assert_eq!(entries(&parent), 1);
    }

    #[test]
    fn test_missing_scratch_parent_is_created() {
        let parent = TempDir::new().unwrap();
        let config = SsdConfig {
            scratch_dir: parent.path().join("a").join("b"),
            ..tiny(&parent)
        };
        let workload = SsdWorkload::new(config, Arc::new(FixedMeter(0.0)));
        assert!(workload.run(&RecordingSink::new()).is_ok());
    }

    #[test]
    fn test_unusable_scratch_dir_is_io_error() {
        let parent = TempDir::new().unwrap();
        let file = parent.path().join("plain-file");
        fs::write(&file, b"x").unwrap();
        let config = SsdConfig {
            scratch_dir: file,
            ..tiny(&parent)
        };
        let workload = SsdWorkload::new(config, Arc::new(FixedMeter(0.0)));
        assert!(matches!(
            workload.run(&RecordingSink::new()),
            Err(WorkloadError::Io(_))
        ));
    }
}
