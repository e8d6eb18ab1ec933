//! Tensor kernels run on the CPU
//!
//! Four kernels execute concurrently; each reports its own progress in 10%
//! steps, so reports from different kernels interleave on the sink.

use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{percent_of, Milestones, Workload, WorkloadError, WorkloadOutput};
use crate::bench::power::PowerMeter;
use crate::bench::sink::ProgressSink;
use crate::config::GpuConfig;
use crate::util::format_score;

const KERNEL_SIZE: usize = 3;
const IN_CHANNELS: usize = 3;
const OUT_CHANNELS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    MatrixMultiply,
    ElementwiseMultiply,
    Convolution,
    CustomOperation,
}

impl Kernel {
    pub const ALL: [Kernel; 4] = [
        Kernel::MatrixMultiply,
        Kernel::ElementwiseMultiply,
        Kernel::Convolution,
        Kernel::CustomOperation,
    ];

    /// Key in the per-test scores
    pub fn key(&self) -> &'static str {
        match self {
            Kernel::MatrixMultiply => "matrix_multiply",
            Kernel::ElementwiseMultiply => "elementwise_multiply",
            Kernel::Convolution => "convolution",
            Kernel::CustomOperation => "custom_operation",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Kernel::MatrixMultiply => "Matrix Multiply",
            Kernel::ElementwiseMultiply => "Elementwise Multiply",
            Kernel::Convolution => "Convolution",
            Kernel::CustomOperation => "Custom Operation",
        }
    }
}

pub struct GpuWorkload {
    config: GpuConfig,
    meter: Arc<dyn PowerMeter>,
}

impl GpuWorkload {
    pub fn new(config: GpuConfig, meter: Arc<dyn PowerMeter>) -> Self {
        Self { config, meter }
    }

    fn run_one(&self, kernel: Kernel, sink: &dyn ProgressSink) -> Result<f64, WorkloadError> {
        let c = &self.config;
        match kernel {
            Kernel::MatrixMultiply => {
                let n = c.matrix_size;
                time_kernel(kernel, c.matrix_iterations, sink, |rng| {
                    let a = random_vec(rng, n * n);
                    let b = random_vec(rng, n * n);
                    mean(&matrix_multiply(&a, &b, n))
                })
            }
            Kernel::ElementwiseMultiply => {
                let n = c.vector_size;
                time_kernel(kernel, c.vector_iterations, sink, |rng| {
                    let a = random_vec(rng, n);
                    let b = random_vec(rng, n);
                    mean(&elementwise_multiply(&a, &b))
                })
            }
            Kernel::Convolution => {
                let size = c.image_size;
                time_kernel(kernel, c.conv_iterations, sink, |rng| {
                    let image = random_vec(rng, size * size * IN_CHANNELS);
                    let weights =
                        random_vec(rng, KERNEL_SIZE * KERNEL_SIZE * IN_CHANNELS * OUT_CHANNELS);
                    mean(&conv2d_same(
                        &image,
                        size,
                        size,
                        IN_CHANNELS,
                        &weights,
                        KERNEL_SIZE,
                        OUT_CHANNELS,
                    ))
                })
            }
            Kernel::CustomOperation => {
                let n = c.vector_size;
                time_kernel(kernel, c.custom_iterations, sink, |rng| {
                    let input = random_vec(rng, n);
                    let weights = random_vec(rng, n);
                    custom_operation(&input, &weights)
                })
            }
        }
    }
}

impl Workload for GpuWorkload {
    fn run(&self, sink: &dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError> {
        let start_wattage = self.meter.measure_wattage();

        let ((matrix, elementwise), (convolution, custom)) = rayon::join(
            || {
                rayon::join(
                    || self.run_one(Kernel::MatrixMultiply, sink),
                    || self.run_one(Kernel::ElementwiseMultiply, sink),
                )
            },
            || {
                rayon::join(
                    || self.run_one(Kernel::Convolution, sink),
                    || self.run_one(Kernel::CustomOperation, sink),
                )
            },
        );

        let mut scores = BTreeMap::new();
        scores.insert(Kernel::MatrixMultiply.key().to_string(), matrix?);
        scores.insert(Kernel::ElementwiseMultiply.key().to_string(), elementwise?);
        scores.insert(Kernel::Convolution.key().to_string(), convolution?);
        scores.insert(Kernel::CustomOperation.key().to_string(), custom?);

        let end_wattage = self.meter.measure_wattage();
        let mut output = WorkloadOutput::from_scores(scores, end_wattage - start_wattage);
        output.total_score = format_score(output.total_score);
        Ok(output)
    }
}

/// Mean seconds per iteration, rounded
fn time_kernel<F>(
    kernel: Kernel,
    iterations: usize,
    sink: &dyn ProgressSink,
    mut step: F,
) -> Result<f64, WorkloadError>
where
    F: FnMut(&mut SmallRng) -> f32,
{
    if iterations == 0 {
        return Err(WorkloadError::Kernel(format!(
            "{} needs at least one iteration",
            kernel.title()
        )));
    }

    let mut rng = SmallRng::from_entropy();
    let mut progress = Milestones::new(kernel.title(), sink);
    progress.advance_to(0);

    let mut checksum = 0.0f32;
    let start = Instant::now();
    for i in 0..iterations {
        checksum += black_box(step(&mut rng));
        progress.advance_to(percent_of(i + 1, iterations));
    }
    let per_iteration = start.elapsed().as_secs_f64() / iterations as f64;

    debug!(kernel = kernel.key(), per_iteration, checksum, "kernel finished");
    Ok(format_score(per_iteration))
}

fn random_vec(rng: &mut SmallRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Row-major `n x n` product
pub fn matrix_multiply(a: &[f32], b: &[f32], n: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; n * n];
    for i in 0..n {
        for k in 0..n {
            let a_ik = a[i * n + k];
            let b_row = &b[k * n..(k + 1) * n];
            let out_row = &mut out[i * n..(i + 1) * n];
            for (o, &b_kj) in out_row.iter_mut().zip(b_row) {
                *o += a_ik * b_kj;
            }
        }
    }
    out
}

pub fn elementwise_multiply(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

/// 2-D convolution, stride 1, zero "same" padding
///
/// `image` is `height x width x in_channels`, `weights` is
/// `k x k x in_channels x out_channels`; output is
/// `height x width x out_channels`.
pub fn conv2d_same(
    image: &[f32],
    height: usize,
    width: usize,
    in_channels: usize,
    weights: &[f32],
    k: usize,
    out_channels: usize,
) -> Vec<f32> {
    let pad = (k / 2) as isize;
    let mut out = vec![0.0f32; height * width * out_channels];

    for y in 0..height {
        for x in 0..width {
            let out_base = (y * width + x) * out_channels;
            for ky in 0..k {
                let iy = y as isize + ky as isize - pad;
                if iy < 0 || iy >= height as isize {
                    continue;
                }
                for kx in 0..k {
                    let ix = x as isize + kx as isize - pad;
                    if ix < 0 || ix >= width as isize {
                        continue;
                    }
                    let in_base = (iy as usize * width + ix as usize) * in_channels;
                    for c in 0..in_channels {
                        let pixel = image[in_base + c];
                        let w_base = ((ky * k + kx) * in_channels + c) * out_channels;
                        let w_row = &weights[w_base..w_base + out_channels];
                        let out_row = &mut out[out_base..out_base + out_channels];
                        for (o, &w) in out_row.iter_mut().zip(w_row) {
                            *o += pixel * w;
                        }
                    }
                }
            }
        }
    }
    out
}

/// `sum(square(input * weights))`
pub fn custom_operation(input: &[f32], weights: &[f32]) -> f32 {
    input
        .iter()
        .zip(weights)
        .map(|(x, w)| {
            let p = x * w;
            p * p
        })
        .sum()
}
