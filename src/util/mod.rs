//! Utility functions module
//!
//! Contains helper functions for units formatting and score rounding.

pub mod units;

// Re-export commonly used functions
pub use units::{format_bytes, format_score, format_watts, throughput_gbps, throughput_gibps};
