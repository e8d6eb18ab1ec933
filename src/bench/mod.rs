//! Benchmark engine module
//!
//! Contains the runner that executes a workload off the coordinating
//! thread, the session that owns one runner per subsystem, result
//! aggregation and the progress/power collaborators.

pub mod aggregator;
pub mod power;
pub mod runner;
pub mod session;
pub mod sink;

// Re-export commonly used types
pub use aggregator::ResultAggregator;
pub use power::{meter_from_config, NullMeter, PowerMeter, PowermetricsMeter};
pub use runner::{BenchmarkRunner, RunnerEvent, RunnerEvents, RunnerState};
pub use session::BenchmarkSession;
pub use sink::{NullSink, ProgressSink};
