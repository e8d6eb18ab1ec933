//! Units formatting and conversion utilities
//!
//! Provides functions for human-readable formatting of sizes, scores,
//! wattage and throughput.

use std::time::Duration;

const GIB: f64 = 1_073_741_824.0;
const GB: f64 = 1_000_000_000.0;

/// Format bytes into human-readable size with appropriate units
///
/// # Examples
/// ```
/// use sysmark::util::units::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(1048576), "1.0 MiB");
/// assert_eq!(format_bytes(1073741824), "1.0 GiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Absolute value rounded to three decimals
///
/// # Examples
/// ```
/// use sysmark::util::units::format_score;
///
/// assert_eq!(format_score(-1.23456), 1.235);
/// assert_eq!(format_score(0.0004), 0.0);
/// ```
pub fn format_score(score: f64) -> f64 {
    (score.abs() * 1000.0).round() / 1000.0
}

/// Decimal gigabytes per second
pub fn throughput_gbps(bytes: u64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }
    bytes as f64 / GB / duration.as_secs_f64()
}

/// Binary gibibytes per second
pub fn throughput_gibps(bytes: u64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }
    bytes as f64 / GIB / duration.as_secs_f64()
}

/// Format a wattage reading; 0.0 means no reading was available
pub fn format_watts(watts: f64) -> String {
    if watts == 0.0 {
        "n/a".to_string()
    } else {
        format!("{:.2} W", watts)
    }
}
