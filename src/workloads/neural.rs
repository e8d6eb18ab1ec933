//! Neural network workload
//!
//! A dense two-layer network (ReLU hidden layer, softmax output). Inference
//! and training run concurrently on separate networks.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{percent_of, Milestones, Workload, WorkloadError, WorkloadOutput};
use crate::bench::power::PowerMeter;
use crate::bench::sink::ProgressSink;
use crate::config::NeuralConfig;

pub const INFERENCE: &str = "inference";
pub const TRAINING: &str = "training";

/// Weights of a two-layer perceptron, row-major by input
#[derive(Debug, Clone)]
pub struct Network {
    inputs: usize,
    hidden: usize,
    classes: usize,
    w1: Vec<f32>,
    b1: Vec<f32>,
    w2: Vec<f32>,
    b2: Vec<f32>,
}

/// Schedule for [`Network::fit`]
#[derive(Debug, Clone, Copy)]
pub struct TrainingParams {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
}

impl From<&NeuralConfig> for TrainingParams {
    fn from(config: &NeuralConfig) -> Self {
        Self {
            epochs: config.epochs,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
        }
    }
}

/// Accumulated gradients for one mini-batch
struct Gradients {
    w1: Vec<f32>,
    b1: Vec<f32>,
    w2: Vec<f32>,
    b2: Vec<f32>,
}

impl Network {
    pub fn random(inputs: usize, hidden: usize, classes: usize, rng: &mut SmallRng) -> Self {
        let s1 = 1.0 / (inputs as f32).sqrt();
        let s2 = 1.0 / (hidden as f32).sqrt();
        Self {
            inputs,
            hidden,
            classes,
            w1: (0..inputs * hidden).map(|_| rng.gen_range(-s1..s1)).collect(),
            b1: vec![0.0; hidden],
            w2: (0..hidden * classes).map(|_| rng.gen_range(-s2..s2)).collect(),
            b2: vec![0.0; classes],
        }
    }

    /// Hidden activations and class probabilities for one sample
    pub fn forward(&self, x: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let mut h = self.b1.clone();
        for (i, &xi) in x.iter().enumerate() {
            let row = &self.w1[i * self.hidden..(i + 1) * self.hidden];
            for (hj, &w) in h.iter_mut().zip(row) {
                *hj += xi * w;
            }
        }
        for hj in h.iter_mut() {
            *hj = hj.max(0.0);
        }

        let mut logits = self.b2.clone();
        for (j, &hj) in h.iter().enumerate() {
            if hj == 0.0 {
                continue;
            }
            let row = &self.w2[j * self.classes..(j + 1) * self.classes];
            for (l, &w) in logits.iter_mut().zip(row) {
                *l += hj * w;
            }
        }

        (h, softmax(&logits))
    }

    pub fn predict(&self, x: &[f32]) -> usize {
        argmax(&self.forward(x).1)
    }

    /// One SGD step over `batch` (indices into `samples`/`labels`)
    fn train_batch(&mut self, samples: &[Vec<f32>], labels: &[usize], batch: &[usize], lr: f32) {
        let mut grads = Gradients {
            w1: vec![0.0; self.w1.len()],
            b1: vec![0.0; self.hidden],
            w2: vec![0.0; self.w2.len()],
            b2: vec![0.0; self.classes],
        };

        for &n in batch {
            let x = &samples[n];
            let (h, mut delta) = self.forward(x);
            // Softmax cross-entropy gradient
            delta[labels[n]] -= 1.0;

            let mut dh = vec![0.0f32; self.hidden];
            for j in 0..self.hidden {
                let row = j * self.classes;
                for k in 0..self.classes {
                    grads.w2[row + k] += h[j] * delta[k];
                    dh[j] += self.w2[row + k] * delta[k];
                }
                if h[j] <= 0.0 {
                    dh[j] = 0.0;
                }
            }
            for (b, d) in grads.b2.iter_mut().zip(&delta) {
                *b += d;
            }

            for (i, &xi) in x.iter().enumerate() {
                let row = i * self.hidden;
                for j in 0..self.hidden {
                    grads.w1[row + j] += xi * dh[j];
                }
            }
            for (b, d) in grads.b1.iter_mut().zip(&dh) {
                *b += d;
            }
        }

        let scale = lr / batch.len().max(1) as f32;
        apply(&mut self.w1, &grads.w1, scale);
        apply(&mut self.b1, &grads.b1, scale);
        apply(&mut self.w2, &grads.w2, scale);
        apply(&mut self.b2, &grads.b2, scale);
    }

    /// Train for `params.epochs` passes of shuffled mini-batches
    pub fn fit<F>(
        &mut self,
        samples: &[Vec<f32>],
        labels: &[usize],
        params: TrainingParams,
        rng: &mut SmallRng,
        mut on_epoch: F,
    ) where
        F: FnMut(usize),
    {
        let mut order: Vec<usize> = (0..samples.len()).collect();
        for epoch in 0..params.epochs {
            order.shuffle(rng);
            for batch in order.chunks(params.batch_size.max(1)) {
                self.train_batch(samples, labels, batch, params.learning_rate);
            }
            on_epoch(epoch + 1);
        }
    }

    /// Fraction of samples whose predicted class matches the label
    pub fn accuracy(&self, samples: &[Vec<f32>], labels: &[usize]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let correct = samples
            .iter()
            .zip(labels)
            .filter(|(x, &label)| self.predict(x) == label)
            .count();
        correct as f64 / samples.len() as f64
    }

    pub fn input_size(&self) -> usize {
        self.inputs
    }
}

fn apply(weights: &mut [f32], grads: &[f32], scale: f32) {
    for (w, g) in weights.iter_mut().zip(grads) {
        *w -= scale * g;
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

pub struct NeuralWorkload {
    config: NeuralConfig,
    meter: Arc<dyn PowerMeter>,
}

impl NeuralWorkload {
    pub fn new(config: NeuralConfig, meter: Arc<dyn PowerMeter>) -> Self {
        Self { config, meter }
    }

    /// Mean of the highest class probability over repeated forward passes
    fn inference(&self, sink: &dyn ProgressSink) -> f64 {
        let c = &self.config;
        let mut rng = SmallRng::from_entropy();
        let network = Network::random(c.input_size, c.hidden_size, c.classes, &mut rng);
        let input: Vec<f32> = (0..c.input_size).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut progress = Milestones::new("Neural Network Inference", sink);
        progress.advance_to(0);

        let mut total = 0.0f64;
        for i in 0..c.inference_iterations {
            let (_, probs) = network.forward(&input);
            total += probs.iter().copied().fold(0.0f32, f32::max) as f64;
            progress.advance_to(percent_of(i + 1, c.inference_iterations));
        }

        total / c.inference_iterations.max(1) as f64
    }

    /// Training-set accuracy after fitting random samples to random labels
    fn training(&self, sink: &dyn ProgressSink) -> f64 {
        let c = &self.config;
        let mut rng = SmallRng::from_entropy();
        let mut network = Network::random(c.input_size, c.hidden_size, c.classes, &mut rng);

        let samples: Vec<Vec<f32>> = (0..c.training_samples)
            .map(|_| (0..c.input_size).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        let labels: Vec<usize> = (0..c.training_samples)
            .map(|_| rng.gen_range(0..c.classes))
            .collect();

        let mut progress = Milestones::new("Neural Network Training", sink);
        progress.advance_to(0);

        network.fit(&samples, &labels, TrainingParams::from(c), &mut rng, |epoch| {
            progress.advance_to(percent_of(epoch, c.epochs))
        });

        let accuracy = network.accuracy(&samples, &labels);
        debug!(accuracy, epochs = c.epochs, "training finished");
        accuracy
    }
}

impl Workload for NeuralWorkload {
    fn run(&self, sink: &dyn ProgressSink) -> Result<WorkloadOutput, WorkloadError> {
        let c = &self.config;
        if c.input_size == 0 || c.hidden_size == 0 || c.classes < 2 {
            return Err(WorkloadError::Kernel(format!(
                "invalid network shape {}x{}x{}",
                c.input_size, c.hidden_size, c.classes
            )));
        }

        let start_wattage = self.meter.measure_wattage();

        let (inference, training) =
            rayon::join(|| self.inference(sink), || self.training(sink));

        let mut scores = BTreeMap::new();
        scores.insert(INFERENCE.to_string(), inference);
        scores.insert(TRAINING.to_string(), training);

        let end_wattage = self.meter.measure_wattage();
        Ok(WorkloadOutput::from_scores(scores, end_wattage - start_wattage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::power::FixedMeter;
    use crate::bench::sink::RecordingSink;

    fn tiny() -> NeuralConfig {
        NeuralConfig {
            input_size: 6,
            hidden_size: 8,
            classes: 3,
            inference_iterations: 20,
            training_samples: 24,
            epochs: 10,
            learning_rate: 0.1,
            batch_size: 4,
        }
    }

    #[test]
    fn test_softmax() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);

        // Large logits do not overflow
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_learns_separable_data() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut network = Network::random(2, 16, 2, &mut rng);
        let samples: Vec<Vec<f32>> = (0..20)
            .map(|i| if i % 2 == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
            .collect();
        let labels: Vec<usize> = (0..20).map(|i| i % 2).collect();

        let params = TrainingParams {
            epochs: 300,
            batch_size: 4,
            learning_rate: 0.5,
        };
        network.fit(&samples, &labels, params, &mut rng, |_| {});
        assert_eq!(network.accuracy(&samples, &labels), 1.0);
        assert_eq!(network.input_size(), 2);
    }

    #[test]
    fn test_output_shape() {
        let config = tiny();
        let classes = config.classes;
        let workload = NeuralWorkload::new(config, Arc::new(FixedMeter(5.0)));
        let sink = RecordingSink::new();
        let output = workload.run(&sink).unwrap();

        let inference = output.per_test_scores[INFERENCE];
        let training = output.per_test_scores[TRAINING];
        assert!(inference >= 1.0 / classes as f64 - 1e-6 && inference <= 1.0 + 1e-6);
        assert!((0.0..=1.0).contains(&training));
        assert!((output.total_score - (inference + training)).abs() < 1e-12);
        assert_eq!(output.total_wattage, 0.0);

        // Both sub-tests report every 10% step
        assert_eq!(sink.percents().len(), 22);
        let statuses = sink.statuses();
        for name in ["Inference", "Training"] {
            let done = format!("Neural Network {} Benchmark Progress: 100%", name);
            assert!(statuses.contains(&done), "missing {:?}", done);
        }
    }

    #[test]
    fn test_invalid_shape_is_kernel_error() {
        let config = NeuralConfig {
            classes: 1,
            ..tiny()
        };
        let workload = NeuralWorkload::new(config, Arc::new(FixedMeter(0.0)));
        assert!(matches!(
            workload.run(&RecordingSink::new()),
            Err(WorkloadError::Kernel(_))
        ));
    }
}
