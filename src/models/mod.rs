//! Data models module
//!
//! Contains the result, progress and totals shapes shared by the runner,
//! the aggregator and the front ends.

pub mod result;

// Re-export commonly used types
pub use result::{BenchmarkResult, ProgressEvent, RunningTotals, Subsystem};
